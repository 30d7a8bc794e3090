use axum::{
    Extension,
    extract::State,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    Error,
    budget::{
        models::{Budget, BudgetState, BudgetSummary},
        status::read_budget_status,
    },
    category::{Category, get_categories},
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        dollar_input_styles, format_currency, format_date, loading_spinner,
    },
    navigation::NavBar,
    timezone::local_today,
    transaction::TransactionKind,
    user::UserID,
};

const OVER_BUDGET_STYLE: &str = "text-red-600 dark:text-red-400";
const UNDER_BUDGET_STYLE: &str = "text-green-600 dark:text-green-400";

fn summary_view(summary: &BudgetSummary) -> Markup {
    let remaining_style = if summary.is_over_budget {
        OVER_BUDGET_STYLE
    } else {
        UNDER_BUDGET_STYLE
    };

    html! {
        section id="budget-summary" class="space-y-2"
        {
            h2 class="text-lg font-semibold" { "Since " (format_date(summary.month_start)) }

            p
            {
                (format_currency(summary.spent)) " of " (format_currency(summary.budget))
                " spent (" (summary.percentage) "%). "
                span class=(remaining_style) { (format_currency(summary.remaining)) " remaining" }
            }

            @if !summary.categories.is_empty() {
                div class="overflow-x-auto rounded dark:bg-gray-800"
                {
                    table id="category-status" class="w-full text-sm text-left rtl:text-right
                        text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                                th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Spent" }
                                th scope="col" class={(TABLE_CELL_STYLE) " text-right"} { "Limit" }
                            }
                        }

                        tbody
                        {
                            @for status in &summary.categories {
                                @let spent_style = if status.is_over_budget {
                                    OVER_BUDGET_STYLE
                                } else {
                                    ""
                                };

                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td class=(TABLE_CELL_STYLE) { (status.category) }
                                    td class={(TABLE_CELL_STYLE) " text-right " (spent_style)}
                                    {
                                        (format_currency(status.spent))
                                    }
                                    td class={(TABLE_CELL_STYLE) " text-right"}
                                    {
                                        @if status.limit > 0.0 {
                                            (format_currency(status.limit))
                                            " (" (status.percentage) "%)"
                                        } @else {
                                            "None"
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn budget_form(budget: Option<&Budget>, categories: &[Category]) -> Markup {
    let amount = budget.map(|budget| format!("{:.2}", budget.amount));
    let limit_for = |category: &Category| {
        budget
            .and_then(|budget| {
                budget
                    .category_limits
                    .iter()
                    .find(|limit| limit.category == category.name.as_ref())
            })
            .map(|limit| format!("{:.2}", limit.limit))
    };
    let spinner = loading_spinner();

    html! {
        form
            hx-post=(endpoints::BUDGET_API)
            hx-target-error="#alert-container"
            class="w-full space-y-4 md:space-y-6"
        {
            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Monthly budget" }

                div class="input-wrapper w-full"
                {
                    input
                        name="amount"
                        id="amount"
                        type="number"
                        step="0.01"
                        min="0.01"
                        placeholder="0.00"
                        required
                        value=[amount.as_deref()]
                        class=(FORM_TEXT_INPUT_STYLE);
                }
            }

            fieldset class="space-y-2"
            {
                legend class=(FORM_LABEL_STYLE) { "Category limits" }

                p class="text-xs text-gray-500 dark:text-gray-400"
                {
                    "Optional. Leave a category empty for no limit. \
                    Limits cannot add up to more than the monthly budget."
                }

                @for category in categories {
                    @let id = format!("limit-{}", category.id);

                    div class="flex items-center gap-3"
                    {
                        input type="hidden" name="category" value=(category.name);

                        label for=(id) class="w-1/2 text-sm" { (category.name) }

                        div class="input-wrapper w-1/2"
                        {
                            input
                                name="limit"
                                id=(id)
                                type="number"
                                step="0.01"
                                min="0"
                                placeholder="No limit"
                                value=[limit_for(category).as_deref()]
                                class=(FORM_TEXT_INPUT_STYLE);
                        }
                    }
                }
            }

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span id="indicator" class="inline htmx-indicator" { (spinner) }
                " Save Budget"
            }
        }
    }
}

fn budget_view(
    budget: Option<&Budget>,
    summary: Option<&BudgetSummary>,
    categories: &[Category],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::BUDGET_VIEW).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-6 w-full lg:max-w-3xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Budget" }

                    @if budget.is_some() {
                        button
                            hx-delete=(endpoints::BUDGET_API)
                            hx-confirm="Are you sure you want to remove your budget?"
                            hx-target-error="#alert-container"
                            class=(BUTTON_DELETE_STYLE)
                        {
                            "Remove Budget"
                        }
                    }
                }

                @match summary {
                    Some(summary) => {
                        (summary_view(summary))
                    },
                    None => {
                        p class="text-sm text-gray-500 dark:text-gray-400"
                        {
                            "No budget set. Save a monthly budget to track this month's spending."
                        }
                    },
                }

                (budget_form(budget, categories))
            }
        }
    };

    base("Budget", &[dollar_input_styles()], &content)
}

/// Renders the budget page with this month's spending and the budget form.
pub async fn get_budget_page(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone).inspect_err(|_| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
    })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let (budget, status) = read_budget_status(user_id, today, &connection)
        .inspect_err(|error| tracing::error!("Could not get budget status: {error}"))?;
    let categories = get_categories(TransactionKind::Expense, &connection)?;

    Ok(budget_view(budget.as_ref(), status.summary.as_ref(), &categories).into_response())
}
