//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error, budget::create_budget_tables, category::create_category_table,
    recurring::create_recurring_transaction_table, transaction::create_transaction_table,
    user::create_user_table,
};

/// Create all the tables for the domain models and seed the default categories.
///
/// Tables are created in dependency order inside a single exclusive
/// transaction, so a partially initialised database is never left behind.
/// Calling this on an existing database is a no-op apart from adding any
/// missing default categories.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction, so it must be set first.
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_recurring_transaction_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_tables(&transaction)?;

    transaction.commit()?;

    Ok(())
}
