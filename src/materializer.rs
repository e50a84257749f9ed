//! Window synchronization: recompute every rule occurrence in a window and make
//! the stored rule-owned events match, atomically.
//!
//! A pass stages the desired events in memory, diffs them against what is
//! stored, and applies the difference inside one IMMEDIATE transaction.
//! Unchanged events keep their ids. Cancellation or a deadline before commit
//! rolls the whole pass back.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;

use crate::control::RunControl;
use crate::dedup::DedupGuard;
use crate::error::Result;
use crate::events::{self, EventFilter};
use crate::models::{DateWindow, EventState, MaterializedEvent, RecurringRule};
use crate::occurrence::{rule_occurrences, ShortMonthPolicy};
use crate::rules;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub window: DateWindow,
    /// Active rules read at the start of the pass.
    pub rules: usize,
    /// Occurrences computed across those rules.
    pub occurrences: usize,
    pub inserted: usize,
    /// Stored events that already matched and were left alone.
    pub kept: usize,
    /// Stored events whose state was corrected.
    pub updated: usize,
    pub deleted: usize,
    /// Settled events of rules that are no longer active.
    pub retained: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
}

impl SyncReport {
    fn new(window: DateWindow) -> Self {
        Self {
            window,
            rules: 0,
            occurrences: 0,
            inserted: 0,
            kept: 0,
            updated: 0,
            deleted: 0,
            retained: 0,
            skipped_duplicates: 0,
            failed: 0,
        }
    }
}

type WindowKey = (i64, DateWindow);

/// One mutex per `(owner, window)` so concurrent syncs of the same window run
/// one after another inside this process. SQLite's write lock covers other
/// processes and overlapping windows. A slot lives only while some sync holds
/// a lease on it.
#[derive(Debug, Default)]
pub struct WindowLocks {
    slots: Mutex<HashMap<WindowKey, Arc<Mutex<()>>>>,
}

impl WindowLocks {
    fn acquire(&self, owner_id: i64, window: DateWindow) -> SlotLease<'_> {
        let key = (owner_id, window);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = Arc::clone(slots.entry(key).or_default());
        SlotLease { locks: self, key, slot }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct SlotLease<'a> {
    locks: &'a WindowLocks,
    key: WindowKey,
    slot: Arc<Mutex<()>>,
}

impl SlotLease<'_> {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // The map's copy plus ours: nobody else is waiting on this window.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

/// Fields that must match for a stored rule-owned event to be reused as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegenKey {
    rule_id: Option<i64>,
    category_id: i64,
    date: chrono::NaiveDate,
    description: String,
    amount: Decimal,
    total_amount: Decimal,
    tags: BTreeSet<String>,
}

impl RegenKey {
    fn of(event: &MaterializedEvent) -> Self {
        Self {
            rule_id: event.rule_id,
            category_id: event.category_id,
            date: event.date,
            description: event.description.clone(),
            amount: event.amount.normalize(),
            total_amount: event.total_amount.normalize(),
            tags: event.tags.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Plan {
    insert: Vec<MaterializedEvent>,
    set_state: Vec<(i64, EventState)>,
    delete: Vec<i64>,
}

pub struct Materializer {
    policy: ShortMonthPolicy,
    locks: WindowLocks,
}

impl Materializer {
    pub fn new(policy: ShortMonthPolicy) -> Self {
        Self {
            policy,
            locks: WindowLocks::default(),
        }
    }

    pub fn policy(&self) -> ShortMonthPolicy {
        self.policy
    }

    /// Resynchronize `owner`'s rule-owned events in `window`.
    ///
    /// Afterwards every occurrence of every active rule in the window exists
    /// exactly once (modulo dedup against user-entered events), classified
    /// against `ctl.as_of`. User-entered events are never touched. Events of
    /// rules that are no longer active are kept if dated before `as_of` and
    /// removed otherwise.
    pub fn sync(
        &self,
        conn: &mut Connection,
        owner_id: i64,
        window: DateWindow,
        ctl: &RunControl,
    ) -> Result<SyncReport> {
        ctl.check()?;
        let lease = self.locks.acquire(owner_id, window);
        let _held = lease.lock();

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let active = rules::list_active_rules(&tx, owner_id)?;
        let existing = events::query_events(&tx, owner_id, window, &EventFilter::default())?;

        let mut report = SyncReport::new(window);
        report.rules = active.len();
        let plan = self.plan(&active, existing, window, ctl, &mut report)?;

        ctl.check()?;
        report.deleted = events::delete_events(&tx, owner_id, &plan.delete)?;
        for (id, state) in &plan.set_state {
            events::update_event_state(&tx, *id, *state)?;
            report.updated += 1;
        }
        for event in &plan.insert {
            ctl.check()?;
            match events::insert_event(&tx, event) {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        owner = owner_id,
                        rule_id = ?event.rule_id,
                        date = %event.date,
                        error = %e,
                        "event insert failed"
                    );
                }
            }
        }

        ctl.check()?;
        tx.commit()?;

        tracing::info!(
            owner = owner_id,
            %window,
            rules = report.rules,
            inserted = report.inserted,
            kept = report.kept,
            updated = report.updated,
            deleted = report.deleted,
            retained = report.retained,
            skipped = report.skipped_duplicates,
            failed = report.failed,
            "window synced"
        );
        Ok(report)
    }

    fn plan(
        &self,
        active: &[RecurringRule],
        existing: Vec<MaterializedEvent>,
        window: DateWindow,
        ctl: &RunControl,
        report: &mut SyncReport,
    ) -> Result<Plan> {
        let active_ids: HashSet<i64> = active.iter().filter_map(|r| r.id).collect();
        let mut plan = Plan::default();

        // Split stored events into those that survive the pass untouched and
        // those the pass owns and may regenerate.
        let mut survivors = Vec::new();
        let mut regenerable: HashMap<RegenKey, Vec<MaterializedEvent>> = HashMap::new();
        for event in existing {
            match event.rule_id {
                None => survivors.push(event),
                Some(rule_id) if !active_ids.contains(&rule_id) && event.date < ctl.as_of => {
                    if event.state != EventState::Actual {
                        if let Some(id) = event.id {
                            plan.set_state.push((id, EventState::Actual));
                        }
                    }
                    report.retained += 1;
                    survivors.push(event);
                }
                Some(_) => regenerable.entry(RegenKey::of(&event)).or_default().push(event),
            }
        }

        let mut guard = DedupGuard::new(&survivors);
        for rule in active {
            ctl.check()?;
            let dates = rule_occurrences(rule, window, self.policy);
            report.occurrences += dates.len();
            for date in dates {
                let candidate = MaterializedEvent::from_rule(rule, date, ctl.as_of);
                if !guard.claim(&candidate) {
                    report.skipped_duplicates += 1;
                    tracing::debug!(
                        owner = candidate.owner_id,
                        rule_id = ?rule.id,
                        date = %date,
                        "occurrence already present, skipped"
                    );
                    continue;
                }
                let reusable = regenerable
                    .get_mut(&RegenKey::of(&candidate))
                    .and_then(|matches| matches.pop());
                match reusable {
                    Some(stored) => {
                        report.kept += 1;
                        if stored.state != candidate.state {
                            if let Some(id) = stored.id {
                                plan.set_state.push((id, candidate.state));
                            }
                        }
                    }
                    None => plan.insert.push(candidate),
                }
            }
        }

        plan.delete = regenerable
            .into_values()
            .flatten()
            .filter_map(|event| event.id)
            .collect();
        plan.delete.sort_unstable();
        Ok(plan)
    }
}
