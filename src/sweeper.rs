use chrono::NaiveDate;
use rusqlite::Connection;

use crate::control::RunControl;
use crate::db::date_to_sql;
use crate::error::Result;

/// Flip every projected event of `owner` dated before `ctl.as_of` to actual.
///
/// Only `state` changes; nothing is inserted or deleted. Returns the number of
/// events settled.
pub fn sweep(conn: &Connection, owner_id: i64, ctl: &RunControl) -> Result<usize> {
    ctl.check()?;
    let settled = settle_before(conn, Some(owner_id), ctl.as_of)?;
    tracing::info!(owner = owner_id, as_of = %ctl.as_of, settled, "sweep complete");
    Ok(settled)
}

/// Sweep every owner with events in the store.
pub fn sweep_all(conn: &Connection, ctl: &RunControl) -> Result<usize> {
    ctl.check()?;
    let settled = settle_before(conn, None, ctl.as_of)?;
    tracing::info!(as_of = %ctl.as_of, settled, "sweep complete for all owners");
    Ok(settled)
}

fn settle_before(conn: &Connection, owner_id: Option<i64>, as_of: NaiveDate) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE events SET state = 'actual' \
         WHERE state = 'projected' AND date < ?1 AND (?2 IS NULL OR owner_id = ?2)",
        rusqlite::params![date_to_sql(as_of), owner_id],
    )?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{add_category, dec, test_db};
    use crate::error::Error;
    use crate::events::{self, EventFilter};
    use crate::models::{DateWindow, EventState, MaterializedEvent};
    use tokio_util::sync::CancellationToken;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn projected(owner_id: i64, category_id: i64, date: NaiveDate) -> MaterializedEvent {
        MaterializedEvent {
            id: None,
            owner_id,
            category_id,
            date,
            amount: dec("15"),
            total_amount: dec("15"),
            description: "Internet".to_string(),
            state: EventState::Projected,
            rule_id: None,
            tags: Default::default(),
        }
    }

    #[test]
    fn test_sweep_settles_only_past_events() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Utilities", "0");
        let past = events::insert_event(&conn, &projected(1, cat, d(2024, 6, 10))).unwrap();
        let today = events::insert_event(&conn, &projected(1, cat, d(2024, 6, 15))).unwrap();
        let future = events::insert_event(&conn, &projected(1, cat, d(2024, 6, 20))).unwrap();

        let settled = sweep(&conn, 1, &RunControl::new(d(2024, 6, 15))).unwrap();
        assert_eq!(settled, 1);
        assert_eq!(events::get_event(&conn, past).unwrap().state, EventState::Actual);
        assert_eq!(events::get_event(&conn, today).unwrap().state, EventState::Projected);
        assert_eq!(events::get_event(&conn, future).unwrap().state, EventState::Projected);
    }

    #[test]
    fn test_sweep_preserves_amounts_and_identity() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Utilities", "0");
        let id = events::insert_event(&conn, &projected(1, cat, d(2024, 6, 10))).unwrap();
        let before = events::get_event(&conn, id).unwrap();
        sweep(&conn, 1, &RunControl::new(d(2024, 7, 1))).unwrap();
        let after = events::get_event(&conn, id).unwrap();
        assert_eq!(after, MaterializedEvent { state: EventState::Actual, ..before });
    }

    #[test]
    fn test_sweep_is_scoped_to_owner() {
        let (_dir, conn) = test_db();
        let cat1 = add_category(&conn, 1, "Utilities", "0");
        let cat2 = add_category(&conn, 2, "Utilities", "0");
        events::insert_event(&conn, &projected(1, cat1, d(2024, 6, 10))).unwrap();
        events::insert_event(&conn, &projected(2, cat2, d(2024, 6, 10))).unwrap();

        sweep(&conn, 1, &RunControl::new(d(2024, 6, 15))).unwrap();
        let june = DateWindow::month(2024, 6).unwrap();
        let other = events::query_events(&conn, 2, june, &EventFilter::default()).unwrap();
        assert_eq!(other[0].state, EventState::Projected);

        assert_eq!(sweep_all(&conn, &RunControl::new(d(2024, 6, 15))).unwrap(), 1);
    }

    #[test]
    fn test_sweep_twice_is_noop() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Utilities", "0");
        events::insert_event(&conn, &projected(1, cat, d(2024, 6, 10))).unwrap();
        let ctl = RunControl::new(d(2024, 6, 15));
        assert_eq!(sweep(&conn, 1, &ctl).unwrap(), 1);
        assert_eq!(sweep(&conn, 1, &ctl).unwrap(), 0);
    }

    #[test]
    fn test_cancelled_sweep_changes_nothing() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Utilities", "0");
        let id = events::insert_event(&conn, &projected(1, cat, d(2024, 6, 10))).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let ctl = RunControl::new(d(2024, 6, 15)).with_cancel(token);
        assert!(matches!(sweep(&conn, 1, &ctl), Err(Error::Cancelled)));
        assert_eq!(events::get_event(&conn, id).unwrap().state, EventState::Projected);
    }
}
