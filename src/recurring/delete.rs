//! Defines the endpoint for deleting a recurring transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    alert::Alert,
    recurring::{RecurringTemplateId, delete_recurring_template},
    user::UserID,
};

/// The state needed to delete a recurring transaction.
#[derive(Debug, Clone)]
pub struct DeleteRecurringState {
    /// The database connection for managing recurring transactions.
    db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteRecurringState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for deleting a recurring transaction, responds with an alert.
///
/// The transactions it already created are kept.
pub async fn delete_recurring_endpoint(
    State(state): State<DeleteRecurringState>,
    Extension(user_id): Extension<UserID>,
    Path(recurring_id): Path<RecurringTemplateId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_recurring_template(recurring_id, user_id, &connection) {
        // The status code has to be 200 OK or HTMX will not delete the table row.
        Ok(()) => Alert::Success {
            message: "Recurring transaction deleted".to_owned(),
            details: "Transactions it already created have been kept.".to_owned(),
        }
        .into_response(),
        Err(error) => {
            tracing::error!("Could not delete recurring transaction {recurring_id}: {error}");
            error.into_alert_response()
        }
    }
}
