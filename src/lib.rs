pub mod aggregate;
pub mod control;
pub mod db;
pub mod dedup;
pub mod error;
pub mod events;
pub mod fmt;
pub mod materializer;
pub mod models;
pub mod occurrence;
pub mod rules;
pub mod scheduler;
pub mod settings;
pub mod sweeper;

pub use error::{Error, Result};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber, logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (normally
/// `Settings::log_filter`) is used.
pub fn init_tracing(default_filter: &str) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("rollforward=info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
