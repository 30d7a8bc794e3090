//! Core category domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, transaction::TransactionKind};

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier for a category.
pub type CategoryId = DatabaseId;

/// A label for grouping transactions, e.g. 'Groceries' or 'Salary'.
///
/// Each category belongs to exactly one [TransactionKind], so "Salary" can
/// only be used for income and "Groceries" only for expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: CategoryName,
    pub kind: TransactionKind,
}
