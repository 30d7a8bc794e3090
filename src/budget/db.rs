//! Storage for the monthly budget and its category limits.

use std::collections::HashSet;

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    budget::models::{Budget, BudgetId, CategoryLimit},
    category::validate_category,
    transaction::TransactionKind,
    user::UserID,
};

/// Round a dollar amount to whole cents so sums can be compared exactly.
fn to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}

/// Replace the user's active budget with a new one that starts `today`.
///
/// Every limit must be for an expense category, and the limits may not add
/// up to more than `amount`. The previous budget and its limits are kept but
/// marked inactive with an end date of `today`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidBudgetAmount] if `amount` is not greater than zero,
/// - [Error::InvalidCategoryLimit] if a limit is not greater than zero,
/// - [Error::DuplicateCategoryLimit] if a category has more than one limit,
/// - [Error::InvalidCategory] if a category is not an expense category,
/// - [Error::CategoryLimitsExceedBudget] if the limits add up to more than `amount`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn save_budget(
    user_id: UserID,
    amount: f64,
    limits: &[CategoryLimit],
    today: Date,
    connection: &Connection,
) -> Result<Budget, Error> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidBudgetAmount(amount));
    }

    let mut seen = HashSet::new();
    for limit in limits {
        if !limit.limit.is_finite() || limit.limit <= 0.0 {
            return Err(Error::InvalidCategoryLimit {
                category: limit.category.clone(),
                limit: limit.limit.to_string(),
            });
        }

        if !seen.insert(limit.category.as_str()) {
            return Err(Error::DuplicateCategoryLimit(limit.category.clone()));
        }

        validate_category(&limit.category, TransactionKind::Expense, connection)?;
    }

    let total: f64 = limits.iter().map(|limit| limit.limit).sum();
    if to_cents(total) > to_cents(amount) {
        return Err(Error::CategoryLimitsExceedBudget {
            limits: total,
            budget: amount,
        });
    }

    let sql_transaction = connection.unchecked_transaction()?;

    retire_active_budget(user_id, today, &sql_transaction)?;

    let budget_id: BudgetId = sql_transaction.query_row(
        "INSERT INTO budget (user_id, amount, start_date) VALUES (?1, ?2, ?3) RETURNING id",
        (user_id.as_i64(), amount, today),
        |row| row.get(0),
    )?;

    {
        let mut insert_limit = sql_transaction.prepare(
            "INSERT INTO category_budget (budget_id, category, limit_amount) VALUES (?1, ?2, ?3)",
        )?;
        for limit in limits {
            insert_limit.execute((budget_id, &limit.category, limit.limit))?;
        }
    }

    sql_transaction.commit()?;

    let mut category_limits = limits.to_vec();
    category_limits.sort_by(|a, b| a.category.cmp(&b.category));

    Ok(Budget {
        id: budget_id,
        amount,
        start_date: today,
        category_limits,
    })
}

/// Get the user's active budget, or `None` if they have not set one.
pub fn get_active_budget(user_id: UserID, connection: &Connection) -> Result<Option<Budget>, Error> {
    let budget: Result<(BudgetId, f64, Date), _> = connection.query_row(
        "SELECT id, amount, start_date FROM budget WHERE user_id = ?1 AND is_active = 1",
        (user_id.as_i64(),),
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );

    let (id, amount, start_date) = match budget {
        Ok(budget) => budget,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    let category_limits = connection
        .prepare(
            "SELECT category, limit_amount FROM category_budget
             WHERE budget_id = ?1 AND is_active = 1
             ORDER BY category ASC",
        )?
        .query_map((id,), |row| {
            Ok(CategoryLimit {
                category: row.get(0)?,
                limit: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Budget {
        id,
        amount,
        start_date,
        category_limits,
    }))
}

/// Retire the user's active budget and its limits as of `today`.
///
/// # Errors
/// Returns [Error::DeleteMissingBudget] if the user has no active budget.
pub fn remove_budget(user_id: UserID, today: Date, connection: &Connection) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    if retire_active_budget(user_id, today, &sql_transaction)? == 0 {
        return Err(Error::DeleteMissingBudget);
    }

    sql_transaction.commit()?;

    Ok(())
}

/// Mark the active budget and its limits inactive, returning how many
/// budgets were retired.
fn retire_active_budget(
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<usize, rusqlite::Error> {
    connection.execute(
        "UPDATE category_budget SET is_active = 0
         WHERE is_active = 1
         AND budget_id IN (SELECT id FROM budget WHERE user_id = ?1 AND is_active = 1)",
        (user_id.as_i64(),),
    )?;

    connection.execute(
        "UPDATE budget SET is_active = 0, end_date = ?2 WHERE user_id = ?1 AND is_active = 1",
        (user_id.as_i64(), today),
    )
}

/// Sum the user's expenses on or after `since`, grouped by category.
///
/// Sorted by total, largest first.
pub fn get_expenses_by_category(
    user_id: UserID,
    since: Date,
    connection: &Connection,
) -> Result<Vec<(String, f64)>, Error> {
    connection
        .prepare(
            "SELECT category, SUM(amount) AS total FROM \"transaction\"
             WHERE user_id = ?1 AND kind = ?2 AND date >= ?3
             GROUP BY category
             ORDER BY total DESC, category ASC",
        )?
        .query_map((user_id.as_i64(), TransactionKind::Expense, since), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .map(|maybe_total| maybe_total.map_err(|error| error.into()))
        .collect()
}

/// Create the budget and category limit tables.
///
/// The user table must exist first.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn create_budget_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            start_date TEXT NOT NULL,
            end_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_budget_one_active
            ON budget(user_id) WHERE is_active = 1;

        CREATE TABLE IF NOT EXISTS category_budget (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            budget_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            limit_amount REAL NOT NULL CHECK (limit_amount > 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            UNIQUE(budget_id, category),
            FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE CASCADE
        );",
    )
}
