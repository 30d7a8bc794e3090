//! Defines the recurring transaction model and its database queries.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::DatabaseId,
    recurring::Frequency,
    transaction::{Amount, TransactionKind},
    user::UserID,
};

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for a recurring transaction.
pub type RecurringTemplateId = DatabaseId;

/// A transaction that repeats on a schedule.
///
/// The template itself is never shown as a transaction. Occurrences up to
/// today are turned into concrete transactions by [crate::run_sweep], which
/// then moves `next_occurrence` forward.
///
/// To create a new `RecurringTemplate`, use [RecurringTemplate::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: RecurringTemplateId,
    pub user_id: UserID,
    pub name: String,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub category: String,
    pub frequency: Frequency,
    /// The date of the first occurrence.
    pub start_date: Date,
    /// The last date an occurrence may fall on, or `None` to repeat forever.
    pub end_date: Option<Date>,
    /// The date of the next occurrence that has not been turned into a transaction.
    pub next_occurrence: Date,
    /// Paused templates are skipped by the sweep.
    pub is_active: bool,
    pub notes: Option<String>,
}

impl RecurringTemplate {
    /// Create a new recurring transaction.
    ///
    /// Shortcut for [RecurringTemplateBuilder] for discoverability.
    pub fn build(
        user_id: UserID,
        name: &str,
        amount: Amount,
        kind: TransactionKind,
        category: &str,
        frequency: Frequency,
        start_date: Date,
    ) -> RecurringTemplateBuilder {
        RecurringTemplateBuilder {
            user_id,
            name: name.to_owned(),
            amount,
            kind,
            category: category.to_owned(),
            frequency,
            start_date,
            end_date: None,
            notes: None,
        }
    }

    /// Whether `date` is after the template's end date.
    pub fn ends_before(&self, date: Date) -> bool {
        self.end_date.is_some_and(|end_date| date > end_date)
    }
}

/// A builder for creating [RecurringTemplate] instances.
///
/// Pass the builder to [create_recurring_template] to store it. The first
/// occurrence is always the start date.
#[derive(Debug, PartialEq, Clone)]
pub struct RecurringTemplateBuilder {
    pub user_id: UserID,
    pub name: String,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub category: String,
    pub frequency: Frequency,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
}

impl RecurringTemplateBuilder {
    /// Set the last date an occurrence may fall on.
    pub fn end_date(mut self, end_date: Option<Date>) -> Self {
        self.end_date = end_date;
        self
    }

    /// Set the notes copied to each generated transaction.
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// The fields of a recurring transaction a user may change after creating it.
///
/// The kind and start date are fixed, and the schedule position
/// (`next_occurrence`) is only moved by the sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringTemplateUpdate {
    pub name: String,
    pub amount: Amount,
    pub category: String,
    pub frequency: Frequency,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
}

/// Which recurring transactions to show by their active flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Active,
    Paused,
    All,
}

/// Which recurring transactions to show by their kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
    #[default]
    All,
    Income,
    Expense,
}

/// Totals over a user's active recurring transactions.
///
/// Totals are the sum of one occurrence of each template, regardless of
/// frequency.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecurringSummary {
    pub income_count: u64,
    pub income_total: f64,
    pub expense_count: u64,
    pub expense_total: f64,
}

impl RecurringSummary {
    /// Income minus expenses.
    pub fn net(&self) -> f64 {
        self.income_total - self.expense_total
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SELECT_COLUMNS: &str = "SELECT id, user_id, name, amount, kind, category, frequency, \
    start_date, end_date, next_occurrence, is_active, notes FROM recurring_transaction";

/// Create the recurring transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_recurring_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS recurring_transaction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            kind TEXT NOT NULL,
            category TEXT NOT NULL,
            frequency TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            next_occurrence TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            notes TEXT,
            CHECK (next_occurrence >= start_date),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_recurring_transaction_due
            ON recurring_transaction(is_active, next_occurrence);",
    )?;

    Ok(())
}

/// Store a new recurring transaction with its first occurrence on the start date.
///
/// No transactions are created. Call [crate::materialize_template] on the
/// result to create the occurrences that are already due.
///
/// # Errors
/// This function will return a:
/// - [Error::EndDateBeforeStartDate] if the end date is before the start date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_recurring_template(
    builder: RecurringTemplateBuilder,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    check_end_date(builder.start_date, builder.end_date)?;

    connection
        .prepare(
            "INSERT INTO recurring_transaction (user_id, name, amount, kind, category, \
                frequency, start_date, end_date, next_occurrence, is_active, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?7, 1, ?9)
             RETURNING id, user_id, name, amount, kind, category, frequency, start_date, \
                end_date, next_occurrence, is_active, notes",
        )?
        .query_row(
            rusqlite::params![
                builder.user_id.as_i64(),
                builder.name,
                builder.amount,
                builder.kind,
                builder.category,
                builder.frequency,
                builder.start_date,
                builder.end_date,
                builder.notes,
            ],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the recurring transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the user has no recurring transaction with that ID,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_recurring_template(
    id: RecurringTemplateId,
    user_id: UserID,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    connection
        .prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1 AND user_id = ?2"))?
        .query_row((id, user_id.as_i64()), map_row)
        .map_err(|error| error.into())
}

/// Retrieve the IDs of every active recurring transaction, across all users,
/// with an occurrence on or before `today`.
///
/// Only the IDs are read so that one malformed row cannot hide the others.
/// Load each one with [get_template_for_sweep].
pub fn get_due_template_ids(
    today: Date,
    connection: &Connection,
) -> Result<Vec<RecurringTemplateId>, Error> {
    connection
        .prepare(
            "SELECT id FROM recurring_transaction \
            WHERE is_active = 1 AND next_occurrence <= ?1 \
            ORDER BY next_occurrence ASC, id ASC",
        )?
        .query_map((today,), |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the recurring transaction `id` regardless of which user owns it.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if there is no recurring transaction with that ID,
/// - or [Error::SqlError] if the row cannot be read, e.g. it holds an unknown kind.
pub fn get_template_for_sweep(
    id: RecurringTemplateId,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    connection
        .prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?
        .query_row((id,), map_row)
        .map_err(|error| error.into())
}

/// Retrieve the user's active recurring transactions.
pub fn get_active_templates(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    list_recurring_templates(user_id, StatusFilter::Active, KindFilter::All, connection)
}

/// Retrieve the user's recurring transactions that match the filters.
///
/// Active templates are listed first, then by the date of their next occurrence.
pub fn list_recurring_templates(
    user_id: UserID,
    status: StatusFilter,
    kind: KindFilter,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    let status_clause = match status {
        StatusFilter::Active => " AND is_active = 1",
        StatusFilter::Paused => " AND is_active = 0",
        StatusFilter::All => "",
    };
    let kind = match kind {
        KindFilter::All => None,
        KindFilter::Income => Some(TransactionKind::Income),
        KindFilter::Expense => Some(TransactionKind::Expense),
    };
    let kind_clause = if kind.is_some() { " AND kind = ?2" } else { "" };

    let query = format!(
        "{SELECT_COLUMNS} WHERE user_id = ?1{status_clause}{kind_clause} \
        ORDER BY is_active DESC, next_occurrence ASC, id ASC"
    );
    let mut statement = connection.prepare(&query)?;

    let rows = match kind {
        Some(kind) => statement.query_map((user_id.as_i64(), kind), map_row)?,
        None => statement.query_map((user_id.as_i64(),), map_row)?,
    };

    rows.map(|maybe_template| maybe_template.map_err(|error| error.into()))
        .collect()
}

/// Count and total the user's active recurring income and expenses.
pub fn get_recurring_summary(
    user_id: UserID,
    connection: &Connection,
) -> Result<RecurringSummary, Error> {
    let mut statement = connection.prepare(
        "SELECT kind, COUNT(id), COALESCE(SUM(amount), 0)
         FROM recurring_transaction
         WHERE user_id = ?1 AND is_active = 1
         GROUP BY kind",
    )?;
    let rows = statement.query_map((user_id.as_i64(),), |row| {
        Ok((
            row.get::<_, TransactionKind>(0)?,
            row.get::<_, u64>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    let mut summary = RecurringSummary::default();

    for row in rows {
        match row? {
            (TransactionKind::Income, count, total) => {
                summary.income_count = count;
                summary.income_total = total;
            }
            (TransactionKind::Expense, count, total) => {
                summary.expense_count = count;
                summary.expense_total = total;
            }
        }
    }

    Ok(summary)
}

/// Move the schedule of recurring transaction `id` to `next_occurrence`,
/// and set whether it is still active.
///
/// # Errors
/// Returns [Error::UpdateMissingRecurringTemplate] if there is no recurring
/// transaction with that ID.
pub fn set_schedule(
    id: RecurringTemplateId,
    next_occurrence: Date,
    is_active: bool,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE recurring_transaction SET next_occurrence = ?1, is_active = ?2 WHERE id = ?3",
        (next_occurrence, is_active, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingRecurringTemplate);
    }

    Ok(())
}

/// Pause an active recurring transaction or resume a paused one.
///
/// Returns whether the recurring transaction is active afterwards.
///
/// # Errors
/// Returns [Error::UpdateMissingRecurringTemplate] if the user has no
/// recurring transaction with that ID.
pub fn toggle_recurring_template(
    id: RecurringTemplateId,
    user_id: UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .prepare(
            "UPDATE recurring_transaction SET is_active = NOT is_active
             WHERE id = ?1 AND user_id = ?2
             RETURNING is_active",
        )?
        .query_row((id, user_id.as_i64()), |row| row.get(0))
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingRecurringTemplate,
            error => error.into(),
        })
}

/// Apply `update` to the recurring transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingRecurringTemplate] if the user has no recurring transaction with that ID,
/// - [Error::EndDateBeforeStartDate] if the new end date is before the start date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_recurring_template(
    id: RecurringTemplateId,
    user_id: UserID,
    update: RecurringTemplateUpdate,
    connection: &Connection,
) -> Result<(), Error> {
    let start_date = match get_recurring_template(id, user_id, connection) {
        Ok(template) => template.start_date,
        Err(Error::NotFound) => return Err(Error::UpdateMissingRecurringTemplate),
        Err(error) => return Err(error),
    };

    check_end_date(start_date, update.end_date)?;

    let rows_affected = connection.execute(
        "UPDATE recurring_transaction
         SET name = ?1, amount = ?2, category = ?3, frequency = ?4, end_date = ?5, notes = ?6
         WHERE id = ?7 AND user_id = ?8",
        rusqlite::params![
            update.name,
            update.amount,
            update.category,
            update.frequency,
            update.end_date,
            update.notes,
            id,
            user_id.as_i64(),
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingRecurringTemplate);
    }

    Ok(())
}

/// Delete the recurring transaction `id` owned by `user_id`.
///
/// Transactions it already created are kept. Their link to the recurring
/// transaction is cleared but they stay marked as recurring.
///
/// # Errors
/// Returns [Error::DeleteMissingRecurringTemplate] if the user has no
/// recurring transaction with that ID.
pub fn delete_recurring_template(
    id: RecurringTemplateId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM recurring_transaction WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRecurringTemplate);
    }

    Ok(())
}

fn check_end_date(start_date: Date, end_date: Option<Date>) -> Result<(), Error> {
    match end_date {
        Some(end_date) if end_date < start_date => Err(Error::EndDateBeforeStartDate {
            start: start_date,
            end: end_date,
        }),
        _ => Ok(()),
    }
}

fn map_row(row: &Row) -> Result<RecurringTemplate, rusqlite::Error> {
    Ok(RecurringTemplate {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        amount: row.get(3)?,
        kind: row.get(4)?,
        category: row.get(5)?,
        frequency: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        next_occurrence: row.get(9)?,
        is_active: row.get(10)?,
        notes: row.get(11)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod test_helpers {
    use rusqlite::Connection;
    use time::Date;

    use crate::{
        db::initialize,
        recurring::{Frequency, RecurringTemplate, RecurringTemplateBuilder},
        transaction::{Amount, TransactionKind},
        user::{UserID, create_user},
    };

    pub fn get_test_connection() -> (Connection, UserID) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("test", &conn).unwrap();
        (conn, user.id)
    }

    pub fn rent(
        user_id: UserID,
        frequency: Frequency,
        start_date: Date,
    ) -> RecurringTemplateBuilder {
        RecurringTemplate::build(
            user_id,
            "Rent",
            Amount::new(500.0).unwrap(),
            TransactionKind::Expense,
            "Housing",
            frequency,
            start_date,
        )
    }

    pub fn salary(
        user_id: UserID,
        frequency: Frequency,
        start_date: Date,
    ) -> RecurringTemplateBuilder {
        RecurringTemplate::build(
            user_id,
            "Salary",
            Amount::new(2000.0).unwrap(),
            TransactionKind::Income,
            "Salary",
            frequency,
            start_date,
        )
    }
}
