//! Defines the route handler for the page that displays transactions as a table.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error, endpoints,
    html::{
        BUTTON_DELETE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, RECURRING_BADGE_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, format_currency,
        format_date,
    },
    navigation::NavBar,
    transaction::{Transaction, count_transactions, get_recent_transactions},
    user::UserID,
};

/// The state needed for the transactions page.
#[derive(Debug, Clone)]
pub struct TransactionsViewState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The maximum number of transactions to show.
    pub page_size: u64,
}

impl FromRef<AppState> for TransactionsViewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            page_size: state.transactions_page_size,
        }
    }
}

/// Render an overview of the user's most recent transactions.
pub async fn get_transactions_page(
    State(state): State<TransactionsViewState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = get_recent_transactions(user_id, state.page_size, &connection)
        .inspect_err(|error| tracing::error!("Could not get transactions: {error}"))?;
    let total = count_transactions(user_id, &connection)?;

    Ok(transactions_view(&transactions, total).into_response())
}

fn transaction_row(transaction: &Transaction) -> Markup {
    let edit_url = endpoints::format_endpoint(endpoints::EDIT_TRANSACTION_VIEW, transaction.id);
    let delete_url = endpoints::format_endpoint(endpoints::TRANSACTION, transaction.id);
    let amount = transaction.amount.signed(transaction.kind);
    let amount_style = if amount < 0.0 {
        "text-red-600 dark:text-red-400"
    } else {
        "text-green-600 dark:text-green-400"
    };

    html! {
        tr class=(TABLE_ROW_STYLE)
        {
            td class=(TABLE_CELL_STYLE) { (format_date(transaction.date)) }

            td class=(TABLE_CELL_STYLE)
            {
                span class="font-medium text-gray-900 dark:text-white" { (transaction.name) }

                @if transaction.is_recurring {
                    " "
                    span class=(RECURRING_BADGE_STYLE) title="Created by a recurring transaction"
                    {
                        "Recurring"
                    }
                }

                @if let Some(notes) = &transaction.notes {
                    p class="text-xs text-gray-500 dark:text-gray-400" { (notes) }
                }
            }

            td class=(TABLE_CELL_STYLE) { (transaction.category) }

            td class={(TABLE_CELL_STYLE) " text-right " (amount_style)}
            {
                (format_currency(amount))
            }

            td class={(TABLE_CELL_STYLE) " space-x-2"}
            {
                a href=(edit_url) class=(LINK_STYLE) { "Edit" }

                button
                    hx-delete=(delete_url)
                    hx-confirm={"Are you sure you want to delete '" (transaction.name) "'?"}
                    hx-target="closest tr"
                    hx-target-error="#alert-container"
                    hx-swap="delete"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }
            }
        }
    }
}

fn transactions_view(transactions: &[Transaction], total: u64) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW).into_html();
    let new_transaction_route = endpoints::NEW_TRANSACTION_VIEW;

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Transactions" }

                    a href=(new_transaction_route) class=(LINK_STYLE) { "Add Transaction" }
                }

                p class="text-sm text-gray-500 dark:text-gray-400"
                {
                    "Showing " (transactions.len()) " of " (total) " transactions"
                }

                div class="overflow-x-auto rounded dark:bg-gray-800"
                {
                    table class="w-full text-sm text-left rtl:text-right
                        text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                                th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Amount" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        tbody
                        {
                            @for transaction in transactions {
                                (transaction_row(transaction))
                            }

                            @if transactions.is_empty() {
                                tr
                                {
                                    td
                                        colspan="5"
                                        class="px-6 py-4 text-center
                                            text-gray-500 dark:text-gray-400"
                                    {
                                        "No transactions yet. "
                                        a href=(new_transaction_route) class=(LINK_STYLE)
                                        {
                                            "Add your first transaction"
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base("Transactions", &[], &content)
}
