use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;

use crate::{
    Error,
    budget::{
        db::save_budget,
        models::{BudgetForm, BudgetState, CategoryLimit},
    },
    endpoints,
    timezone::local_today,
    user::UserID,
};

/// Pair each category with the limit in the same position.
///
/// Blank and zero limits are left out since they mean "no limit".
fn parse_limits(categories: &[String], limits: &[String]) -> Result<Vec<CategoryLimit>, Error> {
    let mut parsed = Vec::new();

    for (category, text) in categories.iter().zip(limits) {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let invalid = || Error::InvalidCategoryLimit {
            category: category.trim().to_owned(),
            limit: text.to_owned(),
        };
        let limit: f64 = text.parse().map_err(|_| invalid())?;
        if !limit.is_finite() || limit < 0.0 {
            return Err(invalid());
        }

        if limit > 0.0 {
            parsed.push(CategoryLimit {
                category: category.trim().to_owned(),
                limit,
            });
        }
    }

    Ok(parsed)
}

/// A route handler for saving the monthly budget, redirects to the budget
/// page on success.
///
/// The new budget replaces the active one from today.
pub async fn save_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Form(form): Form<BudgetForm>,
) -> Response {
    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => {
            tracing::error!("Invalid timezone {}", state.local_timezone);
            return error.into_alert_response();
        }
    };

    let limits = match parse_limits(&form.category, &form.limit) {
        Ok(limits) => limits,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match save_budget(user_id, form.amount, &limits, today, &connection) {
        Ok(budget) => {
            tracing::info!(
                "Saved budget {} of {} with {} category limits",
                budget.id,
                budget.amount,
                budget.category_limits.len()
            );
            (
                HxRedirect(endpoints::BUDGET_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("Could not save budget: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::State, http::StatusCode};
    use axum_extra::extract::Form;
    use rusqlite::Connection;

    use crate::{
        Error,
        budget::{
            db::get_active_budget,
            models::{BudgetForm, BudgetState, CategoryLimit},
        },
        db::initialize,
        endpoints,
        test_utils::assert_hx_redirect,
        user::{UserID, create_user},
    };

    use super::{parse_limits, save_budget_endpoint};

    fn get_test_state() -> (BudgetState, UserID) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("test", &conn).unwrap();

        let state = BudgetState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        (state, user.id)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn blank_and_zero_limits_are_skipped() {
        let got = parse_limits(
            &strings(&["Housing", "Groceries", "Transport"]),
            &strings(&["500", "", "0"]),
        );

        assert_eq!(
            got,
            Ok(vec![CategoryLimit {
                category: "Housing".to_owned(),
                limit: 500.0,
            }])
        );
    }

    #[test]
    fn unreadable_and_negative_limits_are_rejected() {
        for text in ["abc", "-1", "inf"] {
            let got = parse_limits(&strings(&["Housing"]), &strings(&[text]));

            assert_eq!(
                got,
                Err(Error::InvalidCategoryLimit {
                    category: "Housing".to_owned(),
                    limit: text.to_owned(),
                })
            );
        }
    }

    #[tokio::test]
    async fn saves_budget_and_redirects() {
        let (state, user_id) = get_test_state();

        let response = save_budget_endpoint(
            State(state.clone()),
            Extension(user_id),
            Form(BudgetForm {
                amount: 1500.0,
                category: strings(&["Housing", "Groceries"]),
                limit: strings(&["800", ""]),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::BUDGET_VIEW);

        let budget = get_active_budget(user_id, &state.db_connection.lock().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(budget.amount, 1500.0);
        assert_eq!(
            budget.category_limits,
            vec![CategoryLimit {
                category: "Housing".to_owned(),
                limit: 800.0,
            }]
        );
    }

    #[tokio::test]
    async fn limits_over_the_budget_are_a_bad_request() {
        let (state, user_id) = get_test_state();

        let response = save_budget_endpoint(
            State(state.clone()),
            Extension(user_id),
            Form(BudgetForm {
                amount: 500.0,
                category: strings(&["Housing", "Groceries"]),
                limit: strings(&["400", "200"]),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_active_budget(user_id, &state.db_connection.lock().unwrap()),
            Ok(None)
        );
    }

    #[tokio::test]
    async fn zero_budget_is_a_bad_request() {
        let (state, user_id) = get_test_state();

        let response = save_budget_endpoint(
            State(state),
            Extension(user_id),
            Form(BudgetForm {
                amount: 0.0,
                category: Vec::new(),
                limit: Vec::new(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
