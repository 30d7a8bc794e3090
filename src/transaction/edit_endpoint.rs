//! Defines the endpoint for updating a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    category::{CategoryName, validate_category},
    database_id::TransactionId,
    endpoints,
    transaction::{Amount, TransactionUpdate, get_user_transaction, update_transaction},
    user::UserID,
};

/// The state needed to update a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for updating a transaction.
#[derive(Debug, Deserialize)]
pub struct EditTransactionForm {
    pub name: String,
    /// The value of the transaction in dollars.
    pub amount: f64,
    /// The name of a category of the transaction's kind.
    pub category: String,
    pub notes: Option<String>,
}

/// A route handler for updating a transaction, redirects to the transactions
/// view on success.
///
/// Editing a transaction created by a recurring transaction does not change
/// the recurring transaction.
pub async fn edit_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Form(form): Form<EditTransactionForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match update_from_form(transaction_id, user_id, form, &connection) {
        Ok(()) => (
            HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::error!("Could not update transaction {transaction_id}: {error}");
            error.into_alert_response()
        }
    }
}

fn update_from_form(
    transaction_id: TransactionId,
    user_id: UserID,
    form: EditTransactionForm,
    connection: &Connection,
) -> Result<(), Error> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    let amount = Amount::new(form.amount)?;
    let category = CategoryName::new(&form.category)?;

    let kind = match get_user_transaction(transaction_id, user_id, connection) {
        Ok(transaction) => transaction.kind,
        Err(Error::NotFound) => return Err(Error::UpdateMissingTransaction),
        Err(error) => return Err(error),
    };
    validate_category(category.as_ref(), kind, connection)?;

    update_transaction(
        transaction_id,
        user_id,
        TransactionUpdate {
            name: name.to_owned(),
            amount,
            category: category.as_ref().to_owned(),
            notes: form
                .notes
                .map(|notes| notes.trim().to_owned())
                .filter(|notes| !notes.is_empty()),
        },
        connection,
    )
}
