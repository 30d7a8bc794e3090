//! Code for creating the user table and fetching users from the database.
//!
//! Users are registered by the log-in flow, which lives outside this crate.
//! Transactions and recurring transactions only need a user's ID to record
//! who owns them.

use std::fmt::Display;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user logs in with.
    pub username: String,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if `username` is taken or another SQL related
/// error occurred.
pub fn create_user(username: &str, connection: &Connection) -> Result<User, Error> {
    connection.execute("INSERT INTO user (username) VALUES (?1)", (username,))?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username: username.to_owned(),
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare("SELECT id, username FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], |row| {
            Ok(User {
                id: UserID::new(row.get(0)?),
                username: row.get(1)?,
            })
        })
        .map_err(|error| error.into())
}
