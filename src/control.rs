use std::time::Instant;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Per-call inputs that are not part of the data: the reference date used to
/// classify events, plus a cancellation signal and optional deadline.
#[derive(Debug, Clone)]
pub struct RunControl {
    pub as_of: NaiveDate,
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl RunControl {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Today in local time.
    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fails once cancellation is requested or the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }
        Ok(())
    }
}
