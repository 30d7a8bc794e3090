//! Defines the route handler for the page for creating a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error, endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base,
        dollar_input_styles, loading_spinner,
    },
    navigation::NavBar,
    timezone::local_today,
    transaction::{
        TransactionKind,
        form::{
            CategoryOptions, amount_input, category_select, end_date_input, frequency_select,
            kind_radio_group, name_input, notes_input,
        },
    },
};

fn create_transaction_view(today: Date, categories: &CategoryOptions) -> Markup {
    let create_transaction_route = endpoints::TRANSACTIONS_API;
    let nav_bar = NavBar::new(endpoints::NEW_TRANSACTION_VIEW).into_html();
    let spinner = loading_spinner();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            form
                hx-post=(create_transaction_route)
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                h2 class="text-xl font-bold" { "New Transaction" }

                (name_input(None))
                (amount_input(None, true))
                (kind_radio_group(TransactionKind::Expense))
                (category_select(categories, None))

                div
                {
                    label
                        for="date"
                        class=(FORM_LABEL_STYLE)
                    {
                        "Date"
                    }

                    input
                        name="date"
                        id="date"
                        type="date"
                        required
                        value=(today)
                        class=(FORM_TEXT_INPUT_STYLE);

                    p class="mt-1 text-xs text-gray-500 dark:text-gray-400"
                    {
                        "For repeating transactions this is the date of the first occurrence."
                    }
                }

                (notes_input(None))
                (frequency_select(None, true))
                (end_date_input(None))

                button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
                {
                    span
                        id="indicator"
                        class="inline htmx-indicator"
                    {
                        (spinner)
                    }
                    " Create Transaction"
                }
            }
        }
    };

    base("Create Transaction", &[dollar_input_styles()], &content)
}

/// The state needed for create new transaction page.
#[derive(Debug, Clone)]
pub struct CreateTransactionPageState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The database connection for accessing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Renders the page for creating a transaction.
pub async fn get_create_transaction_page(
    State(state): State<CreateTransactionPageState>,
) -> Result<Response, Error> {
    let categories = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        CategoryOptions::load(&connection).inspect_err(|error| {
            tracing::error!("Failed to retrieve categories for new transaction page: {error}")
        })?
    };

    let today = local_today(&state.local_timezone).inspect_err(|_| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
    })?;

    Ok(create_transaction_view(today, &categories).into_response())
}
