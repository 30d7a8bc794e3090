use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{AppState, database_id::DatabaseId, timezone::serialize_date};

pub type BudgetId = DatabaseId;

/// A spending limit for a single expense category within the monthly budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLimit {
    pub category: String,
    /// Always greater than zero.
    pub limit: f64,
}

/// The user's active monthly budget and its category limits.
///
/// A user has at most one active budget. Saving a new one retires the
/// previous budget along with its limits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    pub id: BudgetId,
    /// The most the user plans to spend each month.
    pub amount: f64,
    /// The day the budget was saved.
    #[serde(serialize_with = "serialize_date")]
    pub start_date: Date,
    /// Sorted by category name.
    pub category_limits: Vec<CategoryLimit>,
}

/// This month's spending in one expense category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatus {
    pub category: String,
    pub spent: f64,
    /// Zero if the category has no limit.
    pub limit: f64,
    /// Spending as a percentage of the limit, rounded to one decimal place.
    /// Zero if the category has no limit.
    pub percentage: f64,
    /// Only categories with a limit can be over budget.
    pub is_over_budget: bool,
}

/// This month's spending against the active budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub budget: f64,
    /// The total of this month's expenses. Income is not counted.
    pub spent: f64,
    /// Negative once the budget has been exceeded.
    pub remaining: f64,
    /// Spending as a percentage of the budget, rounded to one decimal place.
    pub percentage: f64,
    pub is_over_budget: bool,
    /// The first day of the month being reported.
    #[serde(serialize_with = "serialize_date")]
    pub month_start: Date,
    /// Categories with spending, largest first, followed by limited
    /// categories with no spending yet.
    pub categories: Vec<CategoryStatus>,
}

/// The budget status served to the budget page and API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub has_budget: bool,
    #[serde(flatten)]
    pub summary: Option<BudgetSummary>,
}

/// The state shared by the budget page and endpoints.
#[derive(Debug, Clone)]
pub struct BudgetState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The form data for saving a budget.
///
/// `category` and `limit` are repeated fields paired by position. A blank
/// or zero limit means the category has no limit.
#[derive(Debug, Deserialize)]
pub struct BudgetForm {
    /// The monthly budget in dollars.
    pub amount: f64,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub limit: Vec<String>,
}
