//! Defines the route handler for the page that lists recurring transactions.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error, endpoints,
    html::{
        BUTTON_DELETE_STYLE, DUE_SOON_BADGE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE,
        PAUSED_BADGE_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        format_currency, format_date,
    },
    navigation::NavBar,
    recurring::{
        KindFilter, RecurringSummary, RecurringTemplate, StatusFilter, get_recurring_summary,
        list_recurring_templates,
    },
    timezone::local_today,
    user::UserID,
};

/// Recurring transactions due within this many days are marked as due soon.
const DUE_SOON_DAYS: i64 = 7;

/// The state needed for the recurring transactions page.
#[derive(Debug, Clone)]
pub struct RecurringPageState {
    /// The database connection for managing recurring transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for RecurringPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The filters for the recurring transactions page.
#[derive(Debug, Default, Deserialize)]
pub struct RecurringQuery {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub kind: KindFilter,
}

/// Render the user's recurring transactions and the totals of the active ones.
pub async fn get_recurring_page(
    State(state): State<RecurringPageState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<RecurringQuery>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone).inspect_err(|_| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
    })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let templates = list_recurring_templates(user_id, query.status, query.kind, &connection)
        .inspect_err(|error| tracing::error!("Could not get recurring transactions: {error}"))?;
    let summary = get_recurring_summary(user_id, &connection)?;

    Ok(recurring_view(&templates, &summary, &query, today).into_response())
}

/// The number of days from `today` until the template's next occurrence.
///
/// Negative if the occurrence has not been swept yet.
fn days_until(template: &RecurringTemplate, today: Date) -> i64 {
    (template.next_occurrence - today).whole_days()
}

fn due_label(days: i64) -> String {
    match days {
        days if days < 0 => "Overdue".to_owned(),
        0 => "Today".to_owned(),
        1 => "Tomorrow".to_owned(),
        days => format!("In {days} days"),
    }
}

/// Render a single table row for `template`.
///
/// Also used by the toggle endpoint to replace the row after a pause or resume.
pub(super) fn template_row(template: &RecurringTemplate, today: Date) -> Markup {
    let edit_url = endpoints::format_endpoint(endpoints::EDIT_RECURRING_VIEW, template.id);
    let toggle_url = endpoints::format_endpoint(endpoints::TOGGLE_RECURRING, template.id);
    let delete_url = endpoints::format_endpoint(endpoints::RECURRING_TRANSACTION, template.id);
    let days = days_until(template, today);
    let is_due_soon = template.is_active && (0..=DUE_SOON_DAYS).contains(&days);
    let amount = template.amount.signed(template.kind);
    let amount_style = if amount < 0.0 {
        "text-red-600 dark:text-red-400"
    } else {
        "text-green-600 dark:text-green-400"
    };

    html! {
        tr class=(TABLE_ROW_STYLE) data-recurring-id=(template.id)
        {
            td class=(TABLE_CELL_STYLE)
            {
                span class="font-medium text-gray-900 dark:text-white" { (template.name) }

                @if !template.is_active {
                    " "
                    span class=(PAUSED_BADGE_STYLE) { "Paused" }
                }

                @if let Some(notes) = &template.notes {
                    p class="text-xs text-gray-500 dark:text-gray-400" { (notes) }
                }
            }

            td class=(TABLE_CELL_STYLE) { (template.category) }

            td class=(TABLE_CELL_STYLE)
            {
                (template.frequency)

                @if let Some(end_date) = template.end_date {
                    p class="text-xs text-gray-500 dark:text-gray-400"
                    {
                        "Until " (format_date(end_date))
                    }
                }
            }

            td class=(TABLE_CELL_STYLE)
            {
                (format_date(template.next_occurrence))

                @if template.is_active {
                    p class="text-xs"
                    {
                        @if is_due_soon {
                            span class=(DUE_SOON_BADGE_STYLE) { (due_label(days)) }
                        } @else {
                            span class="text-gray-500 dark:text-gray-400" { (due_label(days)) }
                        }
                    }
                }
            }

            td class={(TABLE_CELL_STYLE) " text-right " (amount_style)}
            {
                (format_currency(amount))
            }

            td class=(TABLE_CELL_STYLE)
            {
                div class="flex gap-4"
                {
                    a href=(edit_url) class=(LINK_STYLE) { "Edit" }

                    button
                        hx-post=(toggle_url)
                        hx-target="closest tr"
                        hx-target-error="#alert-container"
                        hx-swap="outerHTML"
                        class=(LINK_STYLE)
                    {
                        @if template.is_active { "Pause" } @else { "Resume" }
                    }

                    button
                        hx-delete=(delete_url)
                        hx-confirm={
                            "Are you sure you want to delete '" (template.name) "'? "
                            "Transactions it already created will be kept."
                        }
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
}

fn status_param(status: StatusFilter) -> &'static str {
    match status {
        StatusFilter::Active => "active",
        StatusFilter::Paused => "paused",
        StatusFilter::All => "all",
    }
}

fn kind_param(kind: KindFilter) -> &'static str {
    match kind {
        KindFilter::All => "all",
        KindFilter::Income => "income",
        KindFilter::Expense => "expense",
    }
}

fn filter_url(status: StatusFilter, kind: KindFilter) -> String {
    format!(
        "{}?status={}&kind={}",
        endpoints::RECURRING_VIEW,
        status_param(status),
        kind_param(kind)
    )
}

fn filter_link(url: &str, label: &str, is_current: bool) -> Markup {
    let style = if is_current {
        "px-3 py-1 rounded bg-blue-600 text-white"
    } else {
        "px-3 py-1 rounded text-gray-700 hover:bg-gray-100 \
        dark:text-gray-300 dark:hover:bg-gray-700"
    };

    html! {
        a href=(url) class=(style) aria-current=[is_current.then_some("page")] { (label) }
    }
}

fn filter_bar(query: &RecurringQuery) -> Markup {
    let statuses = [
        (StatusFilter::Active, "Active"),
        (StatusFilter::Paused, "Paused"),
        (StatusFilter::All, "All"),
    ];
    let kinds = [
        (KindFilter::All, "All"),
        (KindFilter::Income, "Income"),
        (KindFilter::Expense, "Expenses"),
    ];

    html! {
        nav class="flex flex-wrap gap-6 text-sm" aria-label="Filters"
        {
            div id="status-filter" class="flex gap-1"
            {
                @for (status, label) in statuses {
                    (filter_link(&filter_url(status, query.kind), label, status == query.status))
                }
            }

            div id="kind-filter" class="flex gap-1"
            {
                @for (kind, label) in kinds {
                    (filter_link(&filter_url(query.status, kind), label, kind == query.kind))
                }
            }
        }
    }
}

fn summary_card(summary: &RecurringSummary) -> Markup {
    let net = summary.net();
    let net_style = if net < 0.0 {
        "text-red-600 dark:text-red-400"
    } else {
        "text-green-600 dark:text-green-400"
    };

    html! {
        dl id="recurring-summary" class="grid grid-cols-3 gap-4 p-4 rounded bg-white dark:bg-gray-800"
        {
            div
            {
                dt class="text-sm text-gray-500 dark:text-gray-400"
                {
                    "Income (" (summary.income_count) ")"
                }
                dd class="text-lg font-semibold" { (format_currency(summary.income_total)) }
            }

            div
            {
                dt class="text-sm text-gray-500 dark:text-gray-400"
                {
                    "Expenses (" (summary.expense_count) ")"
                }
                dd class="text-lg font-semibold" { (format_currency(summary.expense_total)) }
            }

            div
            {
                dt class="text-sm text-gray-500 dark:text-gray-400" { "Net" }
                dd class={"text-lg font-semibold " (net_style)} { (format_currency(net)) }
            }
        }
    }
}

fn recurring_view(
    templates: &[RecurringTemplate],
    summary: &RecurringSummary,
    query: &RecurringQuery,
    today: Date,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::RECURRING_VIEW).into_html();
    let new_transaction_route = endpoints::NEW_TRANSACTION_VIEW;

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Recurring Transactions" }

                    a href=(endpoints::RECURRING_PREVIEW_VIEW) class=(LINK_STYLE)
                    {
                        "See upcoming"
                    }
                }

                (summary_card(summary))
                (filter_bar(query))

                div class="overflow-x-auto rounded dark:bg-gray-800"
                {
                    table class="w-full text-sm text-left rtl:text-right
                        text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Frequency" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Next" }
                                th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Amount" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        tbody
                        {
                            @for template in templates {
                                (template_row(template, today))
                            }

                            @if templates.is_empty() {
                                tr
                                {
                                    td
                                        colspan="6"
                                        class="px-6 py-4 text-center
                                            text-gray-500 dark:text-gray-400"
                                    {
                                        "No recurring transactions match these filters. "
                                        a href=(new_transaction_route) class=(LINK_STYLE)
                                        {
                                            "Add a repeating transaction"
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

    base("Recurring Transactions", &[], &content)
}
