//! Background runner: periodic sweeps, periodic safety-net syncs of the
//! current month, and on-demand syncs requested through a [`SchedulerHandle`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::RunControl;
use crate::db;
use crate::error::{Error, Result};
use crate::materializer::{Materializer, SyncReport};
use crate::models::DateWindow;
use crate::occurrence::ShortMonthPolicy;
use crate::rules;
use crate::settings::Settings;
use crate::sweeper;

const REQUEST_QUEUE: usize = 64;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub data_dir: PathBuf,
    pub sweep_interval: Duration,
    pub sync_interval: Duration,
    /// Months after the current one included in each safety-net sync.
    pub lookahead_months: u32,
    pub policy: ShortMonthPolicy,
    /// Upper bound on a single sweep or sync.
    pub task_timeout: Duration,
}

impl SchedulerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            data_dir: PathBuf::from(&settings.data_dir),
            sweep_interval: settings.sweep_interval(),
            sync_interval: settings.sync_interval(),
            lookahead_months: settings.sync_lookahead_months,
            policy: settings.short_month_policy,
            task_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub owner_id: i64,
    pub window: DateWindow,
}

/// Cheap handle for triggering syncs on a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    requests: mpsc::Sender<SyncRequest>,
}

impl SchedulerHandle {
    pub async fn request_sync(&self, request: SyncRequest) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| Error::Other("scheduler is not running".to_string()))
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    materializer: Arc<Materializer>,
    requests: mpsc::Receiver<SyncRequest>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let materializer = Arc::new(Materializer::new(config.policy));
        let scheduler = Self {
            config,
            materializer,
            requests: rx,
        };
        (scheduler, SchedulerHandle { requests: tx })
    }

    /// Run until `cancel` fires. Both timers fire once immediately on start.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            sweep_every = ?self.config.sweep_interval,
            sync_every = ?self.config.sync_interval,
            "scheduler starting"
        );
        let mut sweep_tick = interval(self.config.sweep_interval);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sync_tick = interval(self.config.sync_interval);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sweep_tick.tick() => {
                    match self.sweep(&cancel).await {
                        Ok(settled) => debug!(settled, "scheduled sweep finished"),
                        Err(e) => warn!(error = %e, "scheduled sweep failed"),
                    }
                }
                _ = sync_tick.tick() => {
                    if let Err(e) = self.sync_current(&cancel).await {
                        warn!(error = %e, "scheduled sync failed");
                    }
                }
                Some(request) = self.requests.recv() => {
                    if let Err(e) = self.sync(request, &cancel).await {
                        warn!(owner = request.owner_id, window = %request.window, error = %e, "requested sync failed");
                    }
                }
            }
        }
        info!("scheduler stopped");
    }

    fn control(&self, cancel: &CancellationToken) -> RunControl {
        RunControl::today()
            .with_cancel(cancel.child_token())
            .with_deadline(Instant::now() + self.config.task_timeout)
    }

    async fn sweep(&self, cancel: &CancellationToken) -> Result<usize> {
        let ctl = self.control(cancel);
        let data_dir = self.config.data_dir.clone();
        blocking(move || {
            let conn = db::open(&data_dir)?;
            sweeper::sweep_all(&conn, &ctl)
        })
        .await
    }

    /// Sync the current month plus the lookahead for every owner with rules or rule-owned events.
    async fn sync_current(&self, cancel: &CancellationToken) -> Result<()> {
        let ctl = self.control(cancel);
        let data_dir = self.config.data_dir.clone();
        let lookahead = self.config.lookahead_months;
        let materializer = Arc::clone(&self.materializer);
        blocking(move || {
            let mut conn = db::open(&data_dir)?;
            let mut window = DateWindow::containing(ctl.as_of);
            let mut windows = vec![window];
            for _ in 0..lookahead {
                window = window.next_month();
                windows.push(window);
            }
            for owner_id in rules::list_owners(&conn)? {
                for window in &windows {
                    if let Err(e) = materializer.sync(&mut conn, owner_id, *window, &ctl) {
                        if matches!(e, Error::Cancelled | Error::DeadlineExceeded) {
                            return Err(e);
                        }
                        warn!(owner = owner_id, %window, error = %e, "safety-net sync failed");
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn sync(&self, request: SyncRequest, cancel: &CancellationToken) -> Result<SyncReport> {
        let ctl = self.control(cancel);
        let data_dir = self.config.data_dir.clone();
        let materializer = Arc::clone(&self.materializer);
        blocking(move || {
            let mut conn = db::open(&data_dir)?;
            materializer.sync(&mut conn, request.owner_id, request.window, &ctl)
        })
        .await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("background task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{add_category, dec};
    use crate::events::{count_events, query_events, EventFilter};
    use crate::models::{EventState, Frequency, MaterializedEvent, RecurringRule};

    fn config(dir: &std::path::Path) -> SchedulerConfig {
        SchedulerConfig {
            data_dir: dir.to_path_buf(),
            sweep_interval: Duration::from_secs(3600),
            sync_interval: Duration::from_secs(3600),
            lookahead_months: 1,
            policy: ShortMonthPolicy::Clamp,
            task_timeout: Duration::from_secs(30),
        }
    }

    fn seed(dir: &std::path::Path) {
        let conn = db::open(dir).unwrap();
        let cat = add_category(&conn, 1, "Bills", "0");
        rules::add_rule(
            &conn,
            &RecurringRule {
                id: None,
                owner_id: 1,
                category_id: cat,
                amount: dec("20"),
                description: "Phone".to_string(),
                frequency: Frequency::monthly(1).unwrap(),
                is_active: true,
                tags: Default::default(),
            },
        )
        .unwrap();
        crate::events::insert_event(
            &conn,
            &MaterializedEvent {
                id: None,
                owner_id: 1,
                category_id: cat,
                date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                amount: dec("5"),
                total_amount: dec("5"),
                description: "Old".to_string(),
                state: EventState::Projected,
                rule_id: None,
                tags: Default::default(),
            },
        )
        .unwrap();
    }

    async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_startup_ticks_sweep_and_sync() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let (scheduler, _handle) = Scheduler::new(config(dir.path()));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(cancel.clone()));

        let path = dir.path().to_path_buf();
        let this_month = DateWindow::containing(chrono::Local::now().date_naive());
        let synced = wait_for(|| {
            let conn = db::open(&path).unwrap();
            count_events(&conn, 1, this_month.next_month()).unwrap() == 1
                && count_events(&conn, 1, this_month).unwrap() == 1
        })
        .await;
        let swept = wait_for(|| {
            let conn = db::open(&path).unwrap();
            let old = DateWindow::month(2020, 1).unwrap();
            query_events(&conn, 1, old, &EventFilter::default()).unwrap()[0].state == EventState::Actual
        })
        .await;

        cancel.cancel();
        task.await.unwrap();
        assert!(synced, "current month and lookahead were not synced");
        assert!(swept, "past projected event was not settled");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_safety_net_clears_events_of_deactivated_last_rule() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let next_month = DateWindow::containing(chrono::Local::now().date_naive()).next_month();
        {
            let mut conn = db::open(dir.path()).unwrap();
            Materializer::new(ShortMonthPolicy::Clamp)
                .sync(&mut conn, 1, next_month, &RunControl::today())
                .unwrap();
            assert_eq!(count_events(&conn, 1, next_month).unwrap(), 1);
            let rule_id = rules::list_active_rules(&conn, 1).unwrap()[0].id.unwrap();
            rules::set_rule_active(&conn, 1, rule_id, false).unwrap();
        }

        let (scheduler, _handle) = Scheduler::new(config(dir.path()));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(cancel.clone()));

        let path = dir.path().to_path_buf();
        let cleared = wait_for(|| {
            let conn = db::open(&path).unwrap();
            count_events(&conn, 1, next_month).unwrap() == 0
        })
        .await;

        cancel.cancel();
        task.await.unwrap();
        assert!(cleared, "upcoming events of the deactivated rule were kept");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_on_demand_sync_request() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let (scheduler, handle) = Scheduler::new(config(dir.path()));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(cancel.clone()));

        let window = DateWindow::month(2021, 3).unwrap();
        handle
            .request_sync(SyncRequest { owner_id: 1, window })
            .await
            .unwrap();
        let path = dir.path().to_path_buf();
        let synced = wait_for(|| {
            let conn = db::open(&path).unwrap();
            count_events(&conn, 1, window).unwrap() == 1
        })
        .await;

        cancel.cancel();
        task.await.unwrap();
        assert!(synced);
        assert!(handle
            .request_sync(SyncRequest { owner_id: 1, window })
            .await
            .is_err());
    }
}
