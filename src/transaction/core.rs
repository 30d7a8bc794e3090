//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::TransactionId, recurring::RecurringTemplateId, user::UserID};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Money that was earned.
    Income,
    /// Money that was spent.
    Expense,
}

impl TransactionKind {
    /// The tag used to store the kind in the database and in forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "INCOME",
            TransactionKind::Expense => "EXPENSE",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Income => write!(f, "income"),
            TransactionKind::Expense => write!(f, "expense"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Ok(TransactionKind::Income),
            "EXPENSE" => Ok(TransactionKind::Expense),
            _ => Err(Error::InvalidTransactionKind(s.to_owned())),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// An amount of money, always greater than zero.
///
/// The direction of the money is recorded by [TransactionKind].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    /// Create an amount.
    ///
    /// # Errors
    ///
    /// Returns [Error::NonPositiveAmount] if `value` is zero, negative or not a number.
    pub fn new(value: f64) -> Result<Self, Error> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(Error::NonPositiveAmount(value))
        }
    }

    /// The amount in dollars.
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// The amount with a sign: positive for income, negative for expenses.
    pub fn signed(&self, kind: TransactionKind) -> f64 {
        match kind {
            TransactionKind::Income => self.0,
            TransactionKind::Expense => -self.0,
        }
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let value = f64::column_result(value)?;

        Amount::new(value).map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// A short description of what the transaction was for.
    pub name: String,
    /// The amount of money spent or earned in this transaction.
    pub amount: Amount,
    /// Whether the money was spent or earned.
    pub kind: TransactionKind,
    /// The name of the category the transaction belongs to.
    pub category: String,
    /// Free text notes.
    pub notes: Option<String>,
    /// A reference to a stored receipt, managed outside this application.
    pub receipt_path: Option<String>,
    /// Whether the transaction was generated from a recurring transaction.
    ///
    /// This stays true after the recurring transaction is deleted.
    pub is_recurring: bool,
    /// The recurring transaction that generated this transaction, if it still exists.
    pub recurring_template_id: Option<RecurringTemplateId>,
    /// When the transaction happened.
    pub date: Date,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        user_id: UserID,
        name: &str,
        amount: Amount,
        kind: TransactionKind,
        category: &str,
        date: Date,
    ) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            name: name.to_owned(),
            amount,
            kind,
            category: category.to_owned(),
            notes: None,
            receipt_path: None,
            recurring_template_id: None,
            date,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// Optional fields default to `None`. Pass the builder to [create_transaction]
/// to store the transaction.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    pub user_id: UserID,
    pub name: String,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub category: String,
    pub notes: Option<String>,
    pub receipt_path: Option<String>,
    /// The recurring transaction that generated this transaction.
    ///
    /// Setting this marks the transaction as recurring.
    pub recurring_template_id: Option<RecurringTemplateId>,
    pub date: Date,
}

impl TransactionBuilder {
    /// Set the notes for the transaction.
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Mark the transaction as generated by the recurring transaction `template_id`.
    pub fn recurring_template_id(mut self, template_id: RecurringTemplateId) -> Self {
        self.recurring_template_id = Some(template_id);
        self
    }
}

/// The fields of a transaction a user may change after creating it.
///
/// The kind, date and recurring link are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub name: String,
    pub amount: Amount,
    pub category: String,
    pub notes: Option<String>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SELECT_COLUMNS: &str = "SELECT id, user_id, name, amount, kind, category, notes, \
    receipt_path, is_recurring, recurring_template_id, date FROM \"transaction\"";

/// Create a new transaction in the database from a builder.
///
/// The caller is responsible for checking the date and category, since
/// recurring transactions are allowed to create transactions that one-off
/// entry forms are not.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidRecurringTemplate] if the recurring transaction ID does not refer to a recurring transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, name, amount, kind, category, notes, \
                receipt_path, is_recurring, recurring_template_id, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING id, user_id, name, amount, kind, category, notes, receipt_path, \
                is_recurring, recurring_template_id, date",
        )?
        .query_row(
            rusqlite::params![
                builder.user_id.as_i64(),
                builder.name,
                builder.amount,
                builder.kind,
                builder.category,
                builder.notes,
                builder.receipt_path,
                builder.recurring_template_id.is_some(),
                builder.recurring_template_id,
                builder.date,
            ],
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) if builder.recurring_template_id.is_some() => {
                Error::InvalidRecurringTemplate(builder.recurring_template_id)
            }
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
#[cfg(test)]
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!("{SELECT_COLUMNS} WHERE id = :id"))?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve the transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the user has no transaction with that ID,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_user_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1 AND user_id = ?2"))?
        .query_one((id, user_id.as_i64()), map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve up to `limit` of the most recent transactions owned by `user_id`.
///
/// Transactions are sorted by date, newest first.
pub fn get_recent_transactions(
    user_id: UserID,
    limit: u64,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY date DESC, id DESC LIMIT ?2"
        ))?
        .query_map((user_id.as_i64(), limit), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the number of transactions owned by `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(user_id: UserID, connection: &Connection) -> Result<u64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1",
            (user_id.as_i64(),),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Delete the transaction `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::DeleteMissingTransaction] if the user has no transaction with that ID.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Overwrite the editable fields of the transaction `id` owned by `user_id`.
///
/// The caller is responsible for checking the category against the
/// transaction's kind.
///
/// # Errors
/// Returns [Error::UpdateMissingTransaction] if the user has no transaction with that ID.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET name = ?1, amount = ?2, category = ?3, notes = ?4
         WHERE id = ?5 AND user_id = ?6",
        rusqlite::params![
            update.name,
            update.amount,
            update.category,
            update.notes,
            id,
            user_id.as_i64(),
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Create the transaction table in the database.
///
/// The recurring transaction table must exist first.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                kind TEXT NOT NULL,
                category TEXT NOT NULL,
                notes TEXT,
                receipt_path TEXT,
                is_recurring INTEGER NOT NULL DEFAULT 0,
                recurring_template_id INTEGER,
                date TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(recurring_template_id) REFERENCES recurring_transaction(id)
                    ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        amount: row.get(3)?,
        kind: row.get(4)?,
        category: row.get(5)?,
        notes: row.get(6)?,
        receipt_path: row.get(7)?,
        is_recurring: row.get(8)?,
        recurring_template_id: row.get(9)?,
        date: row.get(10)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod model_tests {
    use crate::{
        Error,
        transaction::{Amount, TransactionKind},
    };

    #[test]
    fn amount_must_be_positive() {
        assert_eq!(Amount::new(0.0), Err(Error::NonPositiveAmount(0.0)));
        assert_eq!(Amount::new(-1.5), Err(Error::NonPositiveAmount(-1.5)));
        assert!(Amount::new(0.01).is_ok());
    }

    #[test]
    fn amount_rejects_nan() {
        assert!(Amount::new(f64::NAN).is_err());
    }

    #[test]
    fn signed_amount_is_negative_for_expenses() {
        let amount = Amount::new(12.5).unwrap();

        assert_eq!(amount.signed(TransactionKind::Income), 12.5);
        assert_eq!(amount.signed(TransactionKind::Expense), -12.5);
    }

    #[test]
    fn parse_kind_ignores_case() {
        assert_eq!("income".parse(), Ok(TransactionKind::Income));
        assert_eq!("EXPENSE".parse(), Ok(TransactionKind::Expense));
    }

    #[test]
    fn parse_kind_fails_on_unknown_text() {
        assert_eq!(
            "transfer".parse::<TransactionKind>(),
            Err(Error::InvalidTransactionKind("transfer".to_owned()))
        );
    }
}
