//! Defines the endpoint for pausing and resuming a recurring transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    response::{Html, IntoResponse, Response},
};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error,
    alert::Alert,
    html::format_date,
    recurring::{
        RecurringTemplate, RecurringTemplateId, get_recurring_template, list_page::template_row,
        materialize_template, toggle_recurring_template,
    },
    timezone::local_today,
    user::UserID,
};

/// The state needed to pause or resume a recurring transaction.
#[derive(Debug, Clone)]
pub struct ToggleRecurringState {
    /// The database connection for managing recurring transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for ToggleRecurringState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler that pauses an active recurring transaction or resumes a
/// paused one.
///
/// A resumed recurring transaction keeps its schedule, so any occurrences
/// that came due while it was paused are created straight away.
///
/// Responds with the updated table row and an out-of-band alert.
pub async fn toggle_recurring_endpoint(
    State(state): State<ToggleRecurringState>,
    Extension(user_id): Extension<UserID>,
    Path(recurring_id): Path<RecurringTemplateId>,
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

    match toggle(recurring_id, user_id, today, &connection) {
        Ok(response) => response,
        Err(error) => {
            tracing::error!("Could not toggle recurring transaction {recurring_id}: {error}");
            error.into_alert_response()
        }
    }
}

fn toggle(
    recurring_id: RecurringTemplateId,
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<Response, Error> {
    let is_active = toggle_recurring_template(recurring_id, user_id, connection)?;

    if !is_active {
        let template = get_recurring_template(recurring_id, user_id, connection)?;
        let alert = Alert::SuccessSimple {
            message: "Recurring transaction paused".to_owned(),
        };

        return Ok(row_with_alert(&template, today, alert));
    }

    let template = get_recurring_template(recurring_id, user_id, connection)?;
    let count = match materialize_template(&template, today, connection) {
        Ok(count) => count,
        Err(failure) => {
            tracing::error!("{failure}");
            failure.materialized
        }
    };

    // Resuming may have moved the schedule or deactivated it at its end date.
    let template = get_recurring_template(recurring_id, user_id, connection)?;

    let alert = match (template.is_active, template.end_date) {
        (true, _) => Alert::Success {
            message: format!("Resumed '{}'", template.name),
            details: format!("{count} missed transactions were added"),
        },
        (false, Some(end_date)) => Alert::Error {
            message: format!("'{}' ended on {}", template.name, format_date(end_date)),
            details: format!(
                "{count} missed transactions were added and it has no occurrences left. \
                Change its end date to resume it."
            ),
        },
        (false, None) => Alert::Error {
            message: format!("'{}' has no occurrences left", template.name),
            details: format!("{count} missed transactions were added"),
        },
    };

    Ok(row_with_alert(&template, today, alert))
}

fn row_with_alert(template: &RecurringTemplate, today: Date, alert: Alert) -> Response {
    let row = template_row(template, today);

    Html(row.into_string() + &alert.into_html().0).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };
    use scraper::{Html, Selector};
    use time::{Duration, OffsetDateTime};

    use crate::{
        recurring::{
            Frequency, core::test_helpers::*, create_recurring_template, get_recurring_template,
            materialize_template, toggle_recurring_template,
        },
        test_utils::parse_table_row_fragment,
        transaction::count_transactions,
        user::{UserID, create_user},
    };

    use super::{ToggleRecurringState, toggle_recurring_endpoint};

    fn get_test_state() -> (ToggleRecurringState, UserID) {
        let (conn, user_id) = get_test_connection();

        let state = ToggleRecurringState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        (state, user_id)
    }

    fn today() -> time::Date {
        OffsetDateTime::now_utc().date()
    }

    #[tokio::test]
    async fn pausing_returns_paused_row_and_alert() {
        let (state, user_id) = get_test_state();
        let template_id = {
            let conn = state.db_connection.lock().unwrap();
            create_recurring_template(
                rent(user_id, Frequency::Monthly, today() + Duration::days(10)),
                &conn,
            )
            .unwrap()
            .id
        };

        let response =
            toggle_recurring_endpoint(State(state.clone()), Extension(user_id), Path(template_id))
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_table_row_fragment(response).await;
        let row_text = html
            .select(&Selector::parse("tr").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>();
        assert!(row_text.contains("Paused"), "{row_text}");
        assert!(row_text.contains("Resume"), "{row_text}");
        let alert_count = html
            .select(&Selector::parse("#alert-container").unwrap())
            .count();
        assert_eq!(alert_count, 1);

        let conn = state.db_connection.lock().unwrap();
        assert!(
            !get_recurring_template(template_id, user_id, &conn)
                .unwrap()
                .is_active
        );
    }

    #[tokio::test]
    async fn resuming_creates_missed_occurrences() {
        let (state, user_id) = get_test_state();
        let template_id = {
            let conn = state.db_connection.lock().unwrap();
            let template = create_recurring_template(
                rent(user_id, Frequency::Weekly, today() - Duration::days(14)),
                &conn,
            )
            .unwrap();
            toggle_recurring_template(template.id, user_id, &conn).unwrap();
            template.id
        };

        let response =
            toggle_recurring_endpoint(State(state.clone()), Extension(user_id), Path(template_id))
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_table_row_fragment(response).await;
        let alert_text = alert_text(&html);
        assert!(alert_text.contains("3 missed transactions"), "{alert_text}");

        let conn = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(user_id, &conn), Ok(3));
        let template = get_recurring_template(template_id, user_id, &conn).unwrap();
        assert!(template.is_active);
        assert_eq!(template.next_occurrence, today() + Duration::days(7));
    }

    fn alert_text(html: &Html) -> String {
        html.select(&Selector::parse("#alert-container").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>()
    }

    #[tokio::test]
    async fn resuming_after_the_end_date_reports_that_it_ended() {
        let (state, user_id) = get_test_state();
        let template_id = {
            let conn = state.db_connection.lock().unwrap();
            let template = create_recurring_template(
                rent(user_id, Frequency::Weekly, today() - Duration::days(10))
                    .end_date(Some(today() - Duration::days(5))),
                &conn,
            )
            .unwrap();
            // The only occurrence is created and the schedule ends.
            materialize_template(&template, today(), &conn).unwrap();
            template.id
        };

        let response =
            toggle_recurring_endpoint(State(state.clone()), Extension(user_id), Path(template_id))
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_table_row_fragment(response).await;
        let alert_text = alert_text(&html);
        assert!(!alert_text.contains("Resumed"), "{alert_text}");
        assert!(alert_text.contains("ended on"), "{alert_text}");
        assert!(alert_text.contains("0 missed transactions"), "{alert_text}");
        let row_text = html
            .select(&Selector::parse("tr").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>();
        assert!(row_text.contains("Resume"), "{row_text}");

        let conn = state.db_connection.lock().unwrap();
        let template = get_recurring_template(template_id, user_id, &conn).unwrap();
        assert!(!template.is_active);
        assert_eq!(count_transactions(user_id, &conn), Ok(1));
    }

    #[tokio::test]
    async fn cannot_toggle_another_users_template() {
        let (state, user_id) = get_test_state();
        let (template_id, other_user) = {
            let conn = state.db_connection.lock().unwrap();
            let template = create_recurring_template(
                rent(user_id, Frequency::Monthly, today()),
                &conn,
            )
            .unwrap();
            (template.id, create_user("other", &conn).unwrap())
        };

        let response = toggle_recurring_endpoint(
            State(state.clone()),
            Extension(other_user.id),
            Path(template_id),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let conn = state.db_connection.lock().unwrap();
        assert!(
            get_recurring_template(template_id, user_id, &conn)
                .unwrap()
                .is_active
        );
    }
}
