use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;

use crate::{
    Error,
    budget::{db::remove_budget, models::BudgetState},
    endpoints,
    timezone::local_today,
    user::UserID,
};

/// A route handler for removing the monthly budget and its category limits.
///
/// Past budgets stay in the database marked inactive.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => {
            tracing::error!("Invalid timezone {}", state.local_timezone);
            return error.into_alert_response();
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match remove_budget(user_id, today, &connection) {
        Ok(()) => (
            HxRedirect(endpoints::BUDGET_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(Error::DeleteMissingBudget) => Error::DeleteMissingBudget.into_alert_response(),
        Err(error) => {
            tracing::error!("An unexpected error occurred while removing the budget: {error}");
            error.into_alert_response()
        }
    }
}
