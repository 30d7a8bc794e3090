//! Projects the upcoming occurrences of a user's recurring transactions.
//!
//! Nothing is written to the database. The preview is served as an HTML page
//! and as JSON.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::{
    AppState, Error, endpoints,
    html::{
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, format_currency, format_date,
    },
    navigation::NavBar,
    recurring::{
        RecurringTemplate, RecurringTemplateId, frequency::next_occurrence, get_active_templates,
    },
    timezone::{local_today, serialize_date},
    transaction::TransactionKind,
    user::UserID,
};

/// The number of months previewed when none are requested.
const DEFAULT_PREVIEW_MONTHS: u32 = 3;
/// The most months that can be previewed at once.
const MAX_PREVIEW_MONTHS: u32 = 24;
/// The preview counts every month as this many days.
const DAYS_PER_MONTH: i64 = 30;

/// A single projected occurrence of a recurring transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingOccurrence {
    pub recurring_id: RecurringTemplateId,
    pub name: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
}

/// The income and expenses projected for one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthTotals {
    pub income: f64,
    pub expense: f64,
}

/// Every projected occurrence between today and the horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingPreview {
    pub months: u32,
    /// The last date included in the preview.
    #[serde(serialize_with = "serialize_date")]
    pub until: Date,
    /// Sorted by date.
    pub occurrences: Vec<UpcomingOccurrence>,
    /// Totals keyed by month, e.g. "2025-03".
    pub monthly_totals: BTreeMap<String, MonthTotals>,
}

/// Clamp the requested number of months to what the preview supports.
fn clamp_months(months: Option<u32>) -> u32 {
    months
        .unwrap_or(DEFAULT_PREVIEW_MONTHS)
        .clamp(1, MAX_PREVIEW_MONTHS)
}

fn month_key(date: Date) -> String {
    format!("{:04}-{:02}", date.year(), u8::from(date.month()))
}

/// Project the occurrences of the active `templates` from their next
/// occurrence up to `months` × 30 days after `today`.
///
/// Occurrences before today that have not been swept yet are included.
/// Each template stops at its end date.
pub fn preview_upcoming(templates: &[RecurringTemplate], today: Date, months: u32) -> UpcomingPreview {
    let until = today
        .checked_add(Duration::days(DAYS_PER_MONTH * i64::from(months)))
        .unwrap_or(Date::MAX);

    let mut occurrences = Vec::new();

    for template in templates.iter().filter(|template| template.is_active) {
        let mut date = template.next_occurrence;

        while date <= until && !template.ends_before(date) {
            occurrences.push(UpcomingOccurrence {
                recurring_id: template.id,
                name: template.name.clone(),
                amount: template.amount.as_f64(),
                kind: template.kind,
                category: template.category.clone(),
                date,
            });

            let following = next_occurrence(date, template.frequency);
            if following <= date {
                break;
            }
            date = following;
        }
    }

    occurrences.sort_by_key(|occurrence| (occurrence.date, occurrence.recurring_id));

    let mut monthly_totals: BTreeMap<String, MonthTotals> = BTreeMap::new();

    for occurrence in &occurrences {
        let totals = monthly_totals.entry(month_key(occurrence.date)).or_default();

        match occurrence.kind {
            TransactionKind::Income => totals.income += occurrence.amount,
            TransactionKind::Expense => totals.expense += occurrence.amount,
        }
    }

    UpcomingPreview {
        months,
        until,
        occurrences,
        monthly_totals,
    }
}

/// The state needed for the upcoming recurring transactions page and API.
#[derive(Debug, Clone)]
pub struct PreviewState {
    /// The database connection for reading recurring transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for PreviewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The query parameters for the preview.
#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    /// How many months ahead to look, clamped to 1 to 24. Defaults to 3.
    pub months: Option<u32>,
}

fn load_preview(
    state: &PreviewState,
    user_id: UserID,
    months: Option<u32>,
) -> Result<UpcomingPreview, Error> {
    let today = local_today(&state.local_timezone).inspect_err(|_| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
    })?;

    let templates = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_active_templates(user_id, &connection)
            .inspect_err(|error| tracing::error!("Could not get recurring transactions: {error}"))?
    };

    Ok(preview_upcoming(&templates, today, clamp_months(months)))
}

/// Render the upcoming occurrences of the user's recurring transactions.
pub async fn get_preview_page(
    State(state): State<PreviewState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, Error> {
    let preview = load_preview(&state, user_id, query.months)?;

    Ok(preview_view(&preview).into_response())
}

/// Get the upcoming occurrences of the user's recurring transactions as JSON.
pub async fn get_preview_json(
    State(state): State<PreviewState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    match load_preview(&state, user_id, query.months) {
        Ok(preview) => Json(preview).into_response(),
        Err(error) => error.into_alert_response(),
    }
}

fn month_links(current: u32) -> Markup {
    html! {
        nav id="month-filter" class="flex gap-1 text-sm" aria-label="Months"
        {
            @for months in [1, 3, 6, 12, 24] {
                @let url = format!("{}?months={months}", endpoints::RECURRING_PREVIEW_VIEW);
                @let is_current = months == current;

                a
                    href=(url)
                    aria-current=[is_current.then_some("page")]
                    class=(if is_current {
                        "px-3 py-1 rounded bg-blue-600 text-white"
                    } else {
                        "px-3 py-1 rounded text-gray-700 hover:bg-gray-100 \
                        dark:text-gray-300 dark:hover:bg-gray-700"
                    })
                {
                    (months) "m"
                }
            }
        }
    }
}

fn preview_view(preview: &UpcomingPreview) -> Markup {
    let nav_bar = NavBar::new(endpoints::RECURRING_PREVIEW_VIEW).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                header class="flex justify-between flex-wrap items-end gap-2"
                {
                    h1 class="text-xl font-bold" { "Upcoming Transactions" }

                    (month_links(preview.months))
                }

                p class="text-sm text-gray-500 dark:text-gray-400"
                {
                    (preview.occurrences.len()) " occurrences until " (format_date(preview.until))
                }

                div class="overflow-x-auto rounded dark:bg-gray-800"
                {
                    table id="monthly-totals" class="w-full text-sm text-left rtl:text-right
                        text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Month" }
                                th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Income" }
                                th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Expenses" }
                                th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Net" }
                            }
                        }

                        tbody
                        {
                            @for (month, totals) in &preview.monthly_totals {
                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td class=(TABLE_CELL_STYLE) { (month) }
                                    td class={(TABLE_CELL_STYLE) " text-right"}
                                    {
                                        (format_currency(totals.income))
                                    }
                                    td class={(TABLE_CELL_STYLE) " text-right"}
                                    {
                                        (format_currency(totals.expense))
                                    }
                                    td class={(TABLE_CELL_STYLE) " text-right"}
                                    {
                                        (format_currency(totals.income - totals.expense))
                                    }
                                }
                            }
                        }
                    }
                }

                div class="overflow-x-auto rounded dark:bg-gray-800"
                {
                    table id="occurrences" class="w-full text-sm text-left rtl:text-right
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
                            }
                        }

                        tbody
                        {
                            @for occurrence in &preview.occurrences {
                                @let amount = match occurrence.kind {
                                    TransactionKind::Income => occurrence.amount,
                                    TransactionKind::Expense => -occurrence.amount,
                                };

                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td class=(TABLE_CELL_STYLE) { (format_date(occurrence.date)) }
                                    td class=(TABLE_CELL_STYLE) { (occurrence.name) }
                                    td class=(TABLE_CELL_STYLE) { (occurrence.category) }
                                    td class={(TABLE_CELL_STYLE) " text-right"}
                                    {
                                        (format_currency(amount))
                                    }
                                }
                            }

                            @if preview.occurrences.is_empty() {
                                tr
                                {
                                    td
                                        colspan="4"
                                        class="px-6 py-4 text-center
                                            text-gray-500 dark:text-gray-400"
                                    {
                                        "Nothing is due in this period. "
                                        a href=(endpoints::RECURRING_VIEW) class=(LINK_STYLE)
                                        {
                                            "Manage recurring transactions"
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

    base("Upcoming Transactions", &[], &content)
}
