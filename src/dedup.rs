use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::MaterializedEvent;

/// Identity of a logical obligation: two events with the same key are duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub owner_id: i64,
    pub category_id: i64,
    pub date: NaiveDate,
    pub description: String,
}

impl DedupKey {
    pub fn of(event: &MaterializedEvent) -> Self {
        Self {
            owner_id: event.owner_id,
            category_id: event.category_id,
            date: event.date,
            description: event.description.clone(),
        }
    }
}

/// Tracks every key that exists in a window during one sync pass: the events
/// that survive the pass plus the batch staged so far.
#[derive(Debug, Default)]
pub struct DedupGuard {
    stored: HashSet<DedupKey>,
    staged: HashSet<DedupKey>,
}

impl DedupGuard {
    /// Seed the guard with events that stay in the store through this pass.
    pub fn new<'a>(survivors: impl IntoIterator<Item = &'a MaterializedEvent>) -> Self {
        Self {
            stored: survivors.into_iter().map(DedupKey::of).collect(),
            staged: HashSet::new(),
        }
    }

    pub fn exists(&self, owner_id: i64, category_id: i64, date: NaiveDate, description: &str) -> bool {
        let key = DedupKey {
            owner_id,
            category_id,
            date,
            description: description.to_string(),
        };
        self.stored.contains(&key) || self.staged.contains(&key)
    }

    /// Record `event` as staged. Returns false if an equivalent event is
    /// already stored or staged, in which case nothing is recorded.
    pub fn claim(&mut self, event: &MaterializedEvent) -> bool {
        if self.exists(event.owner_id, event.category_id, event.date, &event.description) {
            return false;
        }
        self.staged.insert(DedupKey::of(event))
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}
