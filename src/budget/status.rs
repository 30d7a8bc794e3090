//! Computes this month's spending against the budget and serves it as JSON.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use time::{Date, Duration};

use crate::{
    Error,
    budget::{
        db::{get_active_budget, get_expenses_by_category},
        models::{Budget, BudgetState, BudgetStatus, BudgetSummary, CategoryStatus},
    },
    timezone::local_today,
    user::UserID,
};

/// The first day of the month `today` falls in.
fn month_start(today: Date) -> Date {
    today - Duration::days(i64::from(today.day()) - 1)
}

/// `part` as a percentage of `whole`, rounded to one decimal place.
fn percentage(part: f64, whole: f64) -> f64 {
    (part / whole * 1000.0).round() / 10.0
}

/// Compare this month's expenses with the budget.
///
/// `spending` holds the month's expense totals by category, largest first.
fn budget_status(
    budget: Option<&Budget>,
    spending: &[(String, f64)],
    month_start: Date,
) -> BudgetStatus {
    let Some(budget) = budget else {
        return BudgetStatus {
            has_budget: false,
            summary: None,
        };
    };

    let limit_for = |category: &str| {
        budget
            .category_limits
            .iter()
            .find(|limit| limit.category == category)
            .map_or(0.0, |limit| limit.limit)
    };

    let category_status = |category: &str, spent: f64| {
        let limit = limit_for(category);

        CategoryStatus {
            category: category.to_owned(),
            spent,
            limit,
            percentage: if limit > 0.0 {
                percentage(spent, limit)
            } else {
                0.0
            },
            is_over_budget: limit > 0.0 && spent > limit,
        }
    };

    let mut categories: Vec<CategoryStatus> = spending
        .iter()
        .map(|(category, spent)| category_status(category, *spent))
        .collect();
    for limit in &budget.category_limits {
        if !spending.iter().any(|(category, _)| *category == limit.category) {
            categories.push(category_status(&limit.category, 0.0));
        }
    }

    let spent: f64 = spending.iter().map(|(_, spent)| spent).sum();

    BudgetStatus {
        has_budget: true,
        summary: Some(BudgetSummary {
            budget: budget.amount,
            spent,
            remaining: budget.amount - spent,
            percentage: percentage(spent, budget.amount),
            is_over_budget: spent > budget.amount,
            month_start,
            categories,
        }),
    }
}

/// Read the user's active budget and compare it with the expenses of the
/// month containing `today`.
pub(super) fn read_budget_status(
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<(Option<Budget>, BudgetStatus), Error> {
    let month_start = month_start(today);
    let budget = get_active_budget(user_id, connection)?;
    let spending = match budget {
        Some(_) => get_expenses_by_category(user_id, month_start, connection)?,
        None => Vec::new(),
    };
    let status = budget_status(budget.as_ref(), &spending, month_start);

    Ok((budget, status))
}

fn load_budget_status(state: &BudgetState, user_id: UserID) -> Result<BudgetStatus, Error> {
    let today = local_today(&state.local_timezone).inspect_err(|_| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
    })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    read_budget_status(user_id, today, &connection).map(|(_, status)| status)
}

/// Get this month's spending against the budget as JSON.
pub async fn get_budget_status_json(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    match load_budget_status(&state, user_id) {
        Ok(status) => Json(status).into_response(),
        Err(error) => {
            tracing::error!("Could not get budget status: {error}");
            error.into_alert_response()
        }
    }
}

/// Get the active budget and its category limits as JSON, or `null` if the
/// user has not set a budget.
pub async fn get_budget_json(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match get_active_budget(user_id, &connection) {
        Ok(budget) => Json(budget).into_response(),
        Err(error) => {
            tracing::error!("Could not get budget: {error}");
            error.into_alert_response()
        }
    }
}
