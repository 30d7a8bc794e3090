//! Defines the route handler for the page for editing a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, FORM_CONTAINER_STYLE, base,
        dollar_input_styles, format_date, loading_spinner,
    },
    navigation::NavBar,
    transaction::{
        Transaction, get_user_transaction,
        form::{CategoryOptions, amount_input, category_select, name_input, notes_input},
    },
    user::UserID,
};

/// The state needed for the edit transaction page.
#[derive(Debug, Clone)]
pub struct EditTransactionPageState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn edit_transaction_view(transaction: &Transaction, categories: &CategoryOptions) -> Markup {
    let update_route = endpoints::format_endpoint(endpoints::TRANSACTION, transaction.id);
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW).into_html();
    let spinner = loading_spinner();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            form
                hx-put=(update_route)
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                h2 class="text-xl font-bold" { "Edit Transaction" }

                p class="text-sm text-gray-500 dark:text-gray-400"
                {
                    "An " (transaction.kind) " on " (format_date(transaction.date)) "."

                    @if transaction.is_recurring {
                        " Created by a recurring transaction, changes only apply to this transaction."
                    }
                }

                (name_input(Some(&transaction.name)))
                (amount_input(Some(transaction.amount.as_f64()), false))
                (category_select(categories, Some(&transaction.category)))
                (notes_input(transaction.notes.as_deref()))

                button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
                {
                    span
                        id="indicator"
                        class="inline htmx-indicator"
                    {
                        (spinner)
                    }
                    " Save Changes"
                }

                a href=(endpoints::TRANSACTIONS_VIEW)
                {
                    div class={(BUTTON_SECONDARY_STYLE) " text-center"} { "Cancel" }
                }
            }
        }
    };

    base("Edit Transaction", &[dollar_input_styles()], &content)
}

/// Renders the page for editing a transaction.
///
/// Only categories of the transaction's kind are offered since the kind
/// cannot be changed.
pub async fn get_edit_transaction_page(
    State(state): State<EditTransactionPageState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = get_user_transaction(transaction_id, user_id, &connection)
        .inspect_err(|error| {
            tracing::error!("Could not get transaction {transaction_id}: {error}")
        })?;
    let categories = CategoryOptions::for_kind(transaction.kind, &connection)?;

    Ok(edit_transaction_view(&transaction, &categories).into_response())
}
