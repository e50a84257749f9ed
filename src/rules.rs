//! Rule store: recurring bills, recurring income and the categories they point at.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::db::{decimal_column, tags_column, tags_to_json};
use crate::error::{Error, Result};
use crate::models::{Category, Frequency, IncomeRule, RecurringRule};

const RULE_COLUMNS: &str = "id, owner_id, category_id, amount, description, frequency, \
     day_of_month, day_of_week, month_of_year, tags, is_active";

const INCOME_COLUMNS: &str = "id, owner_id, description, gross_amount, frequency, \
     day_of_month, day_of_week, month_of_year, monthly_deductions, is_active";

/// Anchor columns exactly as stored; may be incomplete for legacy rows.
struct StoredFrequency {
    kind: String,
    day_of_month: Option<i64>,
    day_of_week: Option<i64>,
    month_of_year: Option<i64>,
}

impl StoredFrequency {
    fn read(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get(first)?,
            day_of_month: row.get(first + 1)?,
            day_of_week: row.get(first + 2)?,
            month_of_year: row.get(first + 3)?,
        })
    }

    fn decode(&self, rule_id: i64) -> Result<Frequency> {
        Frequency::from_columns(
            &self.kind,
            self.day_of_month,
            self.day_of_week,
            self.month_of_year,
        )
        .map_err(|reason| Error::InvalidAnchor { rule_id, reason })
    }
}

struct RuleRow {
    id: i64,
    owner_id: i64,
    category_id: i64,
    amount: Decimal,
    description: String,
    frequency: StoredFrequency,
    tags: std::collections::BTreeSet<String>,
    is_active: bool,
}

impl RuleRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            category_id: row.get(2)?,
            amount: decimal_column(row, 3)?,
            description: row.get(4)?,
            frequency: StoredFrequency::read(row, 5)?,
            tags: tags_column(row, 9)?,
            is_active: row.get(10)?,
        })
    }

    fn into_rule(self) -> Result<RecurringRule> {
        let frequency = self.frequency.decode(self.id)?;
        Ok(RecurringRule {
            id: Some(self.id),
            owner_id: self.owner_id,
            category_id: self.category_id,
            amount: self.amount,
            description: self.description,
            frequency,
            is_active: self.is_active,
            tags: self.tags,
        })
    }
}

// ---------------------------------------------------------------------------
// Recurring rules
// ---------------------------------------------------------------------------

pub fn add_rule(conn: &Connection, rule: &RecurringRule) -> Result<i64> {
    let (kind, dom, dow, moy) = rule.frequency.to_columns();
    conn.execute(
        "INSERT INTO rules (owner_id, category_id, amount, description, frequency, \
         day_of_month, day_of_week, month_of_year, tags, is_active) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            rule.owner_id,
            rule.category_id,
            rule.amount.to_string(),
            rule.description,
            kind,
            dom,
            dow,
            moy,
            tags_to_json(&rule.tags)?,
            rule.is_active,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rule `id` belonging to `owner`. Another owner's rule reads as unknown.
pub fn get_rule(conn: &Connection, owner_id: i64, id: i64) -> Result<RecurringRule> {
    let sql = format!("SELECT {RULE_COLUMNS} FROM rules WHERE id = ?1 AND owner_id = ?2");
    conn.query_row(&sql, rusqlite::params![id, owner_id], RuleRow::read)
        .optional()?
        .ok_or(Error::UnknownRule(id))?
        .into_rule()
}

/// Rules for `owner`. Rows with a missing or invalid anchor are skipped with a warning.
pub fn list_rules(conn: &Connection, owner_id: i64, include_inactive: bool) -> Result<Vec<RecurringRule>> {
    let sql = if include_inactive {
        format!("SELECT {RULE_COLUMNS} FROM rules WHERE owner_id = ?1 ORDER BY id")
    } else {
        format!("SELECT {RULE_COLUMNS} FROM rules WHERE owner_id = ?1 AND is_active = 1 ORDER BY id")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([owner_id], RuleRow::read)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_rule() {
            Ok(rule) => rules.push(rule),
            Err(Error::InvalidAnchor { rule_id, reason }) => {
                tracing::warn!(owner = owner_id, rule_id, %reason, "skipping rule with invalid anchor");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(rules)
}

pub fn list_active_rules(conn: &Connection, owner_id: i64) -> Result<Vec<RecurringRule>> {
    list_rules(conn, owner_id, false)
}

pub fn set_rule_active(conn: &Connection, owner_id: i64, id: i64, active: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE rules SET is_active = ?1 WHERE id = ?2 AND owner_id = ?3",
        rusqlite::params![active, id, owner_id],
    )?;
    if changed == 0 {
        return Err(Error::UnknownRule(id));
    }
    Ok(())
}

/// Owners with any rule, active or not, or any rule-owned event.
///
/// Owners whose rules are all inactive are included so a sync can still clear
/// the upcoming events those rules left behind.
pub fn list_owners(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT owner_id FROM rules \
         UNION SELECT owner_id FROM events WHERE rule_id IS NOT NULL \
         ORDER BY owner_id",
    )?;
    let owners = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(owners)
}

// ---------------------------------------------------------------------------
// Income rules
// ---------------------------------------------------------------------------

pub fn add_income_rule(conn: &Connection, rule: &IncomeRule) -> Result<i64> {
    let (kind, dom, dow, moy) = rule.frequency.to_columns();
    conn.execute(
        "INSERT INTO income_rules (owner_id, description, gross_amount, frequency, \
         day_of_month, day_of_week, month_of_year, monthly_deductions, is_active) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            rule.owner_id,
            rule.description,
            rule.gross_amount.to_string(),
            kind,
            dom,
            dow,
            moy,
            rule.monthly_deductions.to_string(),
            rule.is_active,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_income_rules(conn: &Connection, owner_id: i64, include_inactive: bool) -> Result<Vec<IncomeRule>> {
    let filter = if include_inactive { "" } else { " AND is_active = 1" };
    let sql = format!("SELECT {INCOME_COLUMNS} FROM income_rules WHERE owner_id = ?1{filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([owner_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                decimal_column(row, 3)?,
                StoredFrequency::read(row, 4)?,
                decimal_column(row, 8)?,
                row.get::<_, bool>(9)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rules = Vec::with_capacity(rows.len());
    for (id, owner, description, gross_amount, stored, monthly_deductions, is_active) in rows {
        match stored.decode(id) {
            Ok(frequency) => rules.push(IncomeRule {
                id: Some(id),
                owner_id: owner,
                description,
                gross_amount,
                frequency,
                monthly_deductions,
                is_active,
            }),
            Err(e) => tracing::warn!(owner = owner_id, income_rule_id = id, error = %e, "skipping income rule"),
        }
    }
    Ok(rules)
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub fn add_category(conn: &Connection, owner_id: i64, name: &str, monthly_budget: Decimal) -> Result<i64> {
    conn.execute(
        "INSERT INTO categories (owner_id, name, monthly_budget) VALUES (?1, ?2, ?3)",
        rusqlite::params![owner_id, name, monthly_budget.to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_category(conn: &Connection, owner_id: i64, name: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM categories WHERE owner_id = ?1 AND name = ?2",
        rusqlite::params![owner_id, name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::UnknownCategory(name.to_string()))
}

pub fn list_categories(conn: &Connection, owner_id: i64) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, name, monthly_budget FROM categories WHERE owner_id = ?1 ORDER BY name",
    )?;
    let rows = stmt
        .query_map([owner_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                monthly_budget: decimal_column(row, 3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
