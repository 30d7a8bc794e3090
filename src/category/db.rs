//! Database operations for categories.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    category::{Category, CategoryName},
    transaction::TransactionKind,
};

/// The categories every new database starts with.
const DEFAULT_CATEGORIES: &[(&str, TransactionKind)] = &[
    // Income
    ("Salary", TransactionKind::Income),
    ("Freelance", TransactionKind::Income),
    ("Investments", TransactionKind::Income),
    ("Gifts", TransactionKind::Income),
    ("Other Income", TransactionKind::Income),
    // Expenses
    ("Housing", TransactionKind::Expense),
    ("Utilities", TransactionKind::Expense),
    ("Groceries", TransactionKind::Expense),
    ("Transport", TransactionKind::Expense),
    ("Entertainment", TransactionKind::Expense),
    ("Subscriptions", TransactionKind::Expense),
    ("Insurance", TransactionKind::Expense),
    ("Healthcare", TransactionKind::Expense),
    ("Dining Out", TransactionKind::Expense),
    ("Other Expense", TransactionKind::Expense),
];

/// Initialize the category table and add the default categories.
///
/// Default categories that already exist are left untouched.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            UNIQUE(name, kind)
        )",
        (),
    )?;

    let mut statement =
        connection.prepare("INSERT OR IGNORE INTO category (name, kind) VALUES (?1, ?2)")?;

    for (name, kind) in DEFAULT_CATEGORIES {
        statement.execute((name, kind))?;
    }

    Ok(())
}

/// Retrieve the categories for `kind` ordered alphabetically by name.
pub fn get_categories(
    kind: TransactionKind,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, kind FROM category WHERE kind = ?1 ORDER BY name ASC")?
        .query_map((kind,), map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Check that a category called `name` exists for `kind`.
pub fn category_exists(
    name: &str,
    kind: TransactionKind,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM category WHERE name = ?1 AND kind = ?2)",
            (name, kind),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Return an [Error::InvalidCategory] unless `name` is a category of `kind`.
pub fn validate_category(
    name: &str,
    kind: TransactionKind,
    connection: &Connection,
) -> Result<(), Error> {
    if category_exists(name, kind, connection)? {
        Ok(())
    } else {
        Err(Error::InvalidCategory(name.to_owned(), kind))
    }
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let kind = row.get(2)?;

    Ok(Category {
        id,
        name: CategoryName::new_unchecked(&raw_name),
        kind,
    })
}

#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;

    use crate::{Error, category::get_categories, transaction::TransactionKind};

    use super::{category_exists, create_category_table, validate_category};

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_category_table(&connection).expect("Could not create category table");
        connection
    }

    #[test]
    fn default_categories_are_seeded_per_kind() {
        let connection = get_test_db_connection();

        let income = get_categories(TransactionKind::Income, &connection).unwrap();
        let expenses = get_categories(TransactionKind::Expense, &connection).unwrap();

        assert_eq!(income.len(), 5);
        assert_eq!(expenses.len(), 10);
        assert!(
            income
                .iter()
                .all(|category| category.kind == TransactionKind::Income)
        );
    }

    #[test]
    fn categories_are_sorted_by_name() {
        let connection = get_test_db_connection();

        let names: Vec<String> = get_categories(TransactionKind::Income, &connection)
            .unwrap()
            .into_iter()
            .map(|category| category.name.to_string())
            .collect();

        assert_eq!(
            names,
            vec!["Freelance", "Gifts", "Investments", "Other Income", "Salary"]
        );
    }

    #[test]
    fn category_exists_checks_kind() {
        let connection = get_test_db_connection();

        assert!(category_exists("Salary", TransactionKind::Income, &connection).unwrap());
        assert!(!category_exists("Salary", TransactionKind::Expense, &connection).unwrap());
    }

    #[test]
    fn validate_category_fails_for_wrong_kind() {
        let connection = get_test_db_connection();

        let result = validate_category("Groceries", TransactionKind::Income, &connection);

        assert_eq!(
            result,
            Err(Error::InvalidCategory(
                "Groceries".to_owned(),
                TransactionKind::Income
            ))
        );
    }

    #[test]
    fn same_name_allowed_for_both_kinds() {
        let connection = get_test_db_connection();

        let result = connection.execute(
            "INSERT INTO category (name, kind) VALUES (?1, ?2)",
            ("Groceries", TransactionKind::Income),
        );

        assert_eq!(result, Ok(1));
    }

    #[test]
    fn seeding_twice_does_not_duplicate_categories() {
        let connection = get_test_db_connection();

        create_category_table(&connection).unwrap();

        let expenses = get_categories(TransactionKind::Expense, &connection).unwrap();
        assert_eq!(expenses.len(), 10);
    }
}
