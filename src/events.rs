//! Event store: materialized and user-entered financial events.

use rusqlite::types::{Type, ToSql};
use rusqlite::{Connection, OptionalExtension};

use crate::db::{date_column, date_to_sql, decimal_column, tags_column, tags_to_json};
use crate::error::{Error, Result};
use crate::models::{DateWindow, EventState, MaterializedEvent};

const EVENT_COLUMNS: &str = "e.id, e.owner_id, e.category_id, e.date, e.amount, e.total_amount, \
     e.description, e.state, e.rule_id, e.tags";

/// Which events to return, by who created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginFilter {
    #[default]
    Any,
    /// User-entered events only.
    Manual,
    /// Rule-owned events; `Some(id)` narrows to one rule.
    Rule(Option<i64>),
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub state: Option<EventState>,
    pub category_id: Option<i64>,
    pub origin: OriginFilter,
    pub tag: Option<String>,
}

fn read_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaterializedEvent> {
    let raw_state: String = row.get(7)?;
    let state = EventState::parse(&raw_state).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("unknown event state '{raw_state}'").into(),
        )
    })?;
    Ok(MaterializedEvent {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        date: date_column(row, 3)?,
        amount: decimal_column(row, 4)?,
        total_amount: decimal_column(row, 5)?,
        description: row.get(6)?,
        state,
        rule_id: row.get(8)?,
        tags: tags_column(row, 9)?,
    })
}

/// Events for `owner` dated inside `window`, ordered by `(date, id)`.
pub fn query_events(
    conn: &Connection,
    owner_id: i64,
    window: DateWindow,
    filter: &EventFilter,
) -> Result<Vec<MaterializedEvent>> {
    let mut clauses = vec![
        "e.owner_id = ?1".to_string(),
        "e.date BETWEEN ?2 AND ?3".to_string(),
    ];
    let mut params: Vec<Box<dyn ToSql>> = vec![
        Box::new(owner_id),
        Box::new(date_to_sql(window.start)),
        Box::new(date_to_sql(window.end)),
    ];

    if let Some(state) = filter.state {
        params.push(Box::new(state.as_str()));
        clauses.push(format!("e.state = ?{}", params.len()));
    }
    if let Some(category_id) = filter.category_id {
        params.push(Box::new(category_id));
        clauses.push(format!("e.category_id = ?{}", params.len()));
    }
    match filter.origin {
        OriginFilter::Any => {}
        OriginFilter::Manual => clauses.push("e.rule_id IS NULL".to_string()),
        OriginFilter::Rule(None) => clauses.push("e.rule_id IS NOT NULL".to_string()),
        OriginFilter::Rule(Some(rule_id)) => {
            params.push(Box::new(rule_id));
            clauses.push(format!("e.rule_id = ?{}", params.len()));
        }
    }
    if let Some(tag) = &filter.tag {
        params.push(Box::new(tag.clone()));
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(e.tags) WHERE json_each.value = ?{})",
            params.len()
        ));
    }

    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events e WHERE {} ORDER BY e.date, e.id",
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), read_event)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_event(conn: &Connection, id: i64) -> Result<MaterializedEvent> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?1");
    conn.query_row(&sql, [id], read_event)
        .optional()?
        .ok_or(Error::UnknownEvent(id))
}

pub fn insert_event(conn: &Connection, event: &MaterializedEvent) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (owner_id, category_id, date, amount, total_amount, description, state, rule_id, tags) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            event.owner_id,
            event.category_id,
            date_to_sql(event.date),
            event.amount.to_string(),
            event.total_amount.to_string(),
            event.description,
            event.state.as_str(),
            event.rule_id,
            tags_to_json(&event.tags)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_event_state(conn: &Connection, id: i64, state: EventState) -> Result<()> {
    let changed = conn.execute(
        "UPDATE events SET state = ?1 WHERE id = ?2",
        rusqlite::params![state.as_str(), id],
    )?;
    if changed == 0 {
        return Err(Error::UnknownEvent(id));
    }
    Ok(())
}

/// Delete rule-owned events by id. User-entered events are never matched.
pub fn delete_events(conn: &Connection, owner_id: i64, ids: &[i64]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "DELETE FROM events WHERE id = ?1 AND owner_id = ?2 AND rule_id IS NOT NULL",
    )?;
    let mut deleted = 0;
    for id in ids {
        deleted += stmt.execute(rusqlite::params![id, owner_id])?;
    }
    Ok(deleted)
}

/// Delete every rule-owned event of `owner` dated inside `window`.
pub fn delete_events_in(conn: &Connection, owner_id: i64, window: DateWindow) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM events WHERE owner_id = ?1 AND date BETWEEN ?2 AND ?3 AND rule_id IS NOT NULL",
        rusqlite::params![owner_id, date_to_sql(window.start), date_to_sql(window.end)],
    )?)
}

/// Whether an event with this dedup key is already stored.
pub fn exists(
    conn: &Connection,
    owner_id: i64,
    category_id: i64,
    date: chrono::NaiveDate,
    description: &str,
) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM events WHERE owner_id = ?1 AND category_id = ?2 AND date = ?3 AND description = ?4",
    )?;
    Ok(stmt.exists(rusqlite::params![owner_id, category_id, date_to_sql(date), description])?)
}

pub fn count_events(conn: &Connection, owner_id: i64, window: DateWindow) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT count(*) FROM events WHERE owner_id = ?1 AND date BETWEEN ?2 AND ?3",
        rusqlite::params![owner_id, date_to_sql(window.start), date_to_sql(window.end)],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{add_category, dec, test_db};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn event(category_id: i64, date: NaiveDate, rule_id: Option<i64>, tags: &[&str]) -> MaterializedEvent {
        MaterializedEvent {
            id: None,
            owner_id: 1,
            category_id,
            date,
            amount: dec("12.50"),
            total_amount: dec("12.50"),
            description: "Gym".to_string(),
            state: EventState::Projected,
            rule_id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn seed_rule(conn: &Connection, category_id: i64) -> i64 {
        conn.execute(
            "INSERT INTO rules (owner_id, category_id, amount, description, frequency, day_of_month) \
             VALUES (1, ?1, '12.50', 'Gym', 'monthly', 5)",
            [category_id],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_insert_and_query_window() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Health", "0");
        insert_event(&conn, &event(cat, d(2024, 1, 5), None, &[])).unwrap();
        insert_event(&conn, &event(cat, d(2024, 2, 5), None, &[])).unwrap();
        let jan = query_events(&conn, 1, DateWindow::month(2024, 1).unwrap(), &EventFilter::default()).unwrap();
        assert_eq!(jan.len(), 1);
        assert_eq!(jan[0].date, d(2024, 1, 5));
        assert_eq!(jan[0].amount, dec("12.50"));
        assert!(query_events(&conn, 2, DateWindow::month(2024, 1).unwrap(), &EventFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_filters() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Health", "0");
        let rule = seed_rule(&conn, cat);
        insert_event(&conn, &event(cat, d(2024, 1, 5), None, &["fitness"])).unwrap();
        let owned = insert_event(&conn, &event(cat, d(2024, 1, 6), Some(rule), &[])).unwrap();
        update_event_state(&conn, owned, EventState::Actual).unwrap();
        let window = DateWindow::month(2024, 1).unwrap();

        let manual = EventFilter { origin: OriginFilter::Manual, ..Default::default() };
        assert_eq!(query_events(&conn, 1, window, &manual).unwrap().len(), 1);

        let by_rule = EventFilter { origin: OriginFilter::Rule(Some(rule)), ..Default::default() };
        assert_eq!(query_events(&conn, 1, window, &by_rule).unwrap()[0].id, Some(owned));

        let actual = EventFilter { state: Some(EventState::Actual), ..Default::default() };
        assert_eq!(query_events(&conn, 1, window, &actual).unwrap().len(), 1);

        let tagged = EventFilter { tag: Some("fitness".to_string()), ..Default::default() };
        let found = query_events(&conn, 1, window, &tagged).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_manual());
    }

    #[test]
    fn test_delete_events_never_touches_manual() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Health", "0");
        let rule = seed_rule(&conn, cat);
        let manual = insert_event(&conn, &event(cat, d(2024, 1, 5), None, &[])).unwrap();
        let owned = insert_event(&conn, &event(cat, d(2024, 1, 6), Some(rule), &[])).unwrap();
        assert_eq!(delete_events(&conn, 1, &[manual, owned]).unwrap(), 1);
        assert!(get_event(&conn, manual).is_ok());
        assert!(matches!(get_event(&conn, owned), Err(Error::UnknownEvent(_))));
    }

    #[test]
    fn test_delete_events_in_window() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Health", "0");
        let rule = seed_rule(&conn, cat);
        insert_event(&conn, &event(cat, d(2024, 1, 5), None, &[])).unwrap();
        insert_event(&conn, &event(cat, d(2024, 1, 6), Some(rule), &[])).unwrap();
        let february = insert_event(&conn, &event(cat, d(2024, 2, 6), Some(rule), &[])).unwrap();

        let jan = DateWindow::month(2024, 1).unwrap();
        assert_eq!(delete_events_in(&conn, 1, jan).unwrap(), 1);
        assert_eq!(count_events(&conn, 1, jan).unwrap(), 1);
        assert!(get_event(&conn, february).is_ok());
    }

    #[test]
    fn test_exists_matches_dedup_key() {
        let (_dir, conn) = test_db();
        let cat = add_category(&conn, 1, "Health", "0");
        insert_event(&conn, &event(cat, d(2024, 1, 5), None, &[])).unwrap();
        assert!(exists(&conn, 1, cat, d(2024, 1, 5), "Gym").unwrap());
        assert!(!exists(&conn, 1, cat, d(2024, 1, 5), "Pool").unwrap());
        assert!(!exists(&conn, 2, cat, d(2024, 1, 5), "Gym").unwrap());
    }

    #[test]
    fn test_update_unknown_event() {
        let (_dir, conn) = test_db();
        assert!(matches!(
            update_event_state(&conn, 99, EventState::Actual),
            Err(Error::UnknownEvent(99))
        ));
    }
}
