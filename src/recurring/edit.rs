//! Defines the page and endpoint for editing a recurring transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    category::{CategoryName, validate_category},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, FORM_CONTAINER_STYLE, base,
        dollar_input_styles, format_date, loading_spinner,
    },
    navigation::NavBar,
    recurring::{
        Frequency, RecurringTemplate, RecurringTemplateId, RecurringTemplateUpdate,
        get_recurring_template, update_recurring_template,
    },
    transaction::{
        Amount, CategoryOptions, amount_input, category_select, end_date_input, frequency_select,
        name_input, notes_input,
    },
    user::UserID,
};

/// The state needed to edit a recurring transaction.
#[derive(Debug, Clone)]
pub struct EditRecurringState {
    /// The database connection for managing recurring transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditRecurringState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn edit_recurring_view(template: &RecurringTemplate, categories: &CategoryOptions) -> Markup {
    let update_route = endpoints::format_endpoint(endpoints::RECURRING_TRANSACTION, template.id);
    let nav_bar = NavBar::new(endpoints::RECURRING_VIEW).into_html();
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
                h2 class="text-xl font-bold" { "Edit Recurring Transaction" }

                p class="text-sm text-gray-500 dark:text-gray-400"
                {
                    "A repeating " (template.kind) " that started on "
                    (format_date(template.start_date)) ". Next due "
                    (format_date(template.next_occurrence)) "."
                }

                (name_input(Some(&template.name)))
                (amount_input(Some(template.amount.as_f64()), false))
                (category_select(categories, Some(&template.category)))
                (frequency_select(Some(template.frequency), false))
                (end_date_input(template.end_date))
                (notes_input(template.notes.as_deref()))

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

                a href=(endpoints::RECURRING_VIEW)
                {
                    div class={(BUTTON_SECONDARY_STYLE) " text-center"} { "Cancel" }
                }
            }
        }
    };

    base("Edit Recurring Transaction", &[dollar_input_styles()], &content)
}

/// Renders the page for editing a recurring transaction.
///
/// The category list only has categories of the recurring transaction's
/// kind, since the kind cannot be changed.
pub async fn get_edit_recurring_page(
    State(state): State<EditRecurringState>,
    Extension(user_id): Extension<UserID>,
    Path(recurring_id): Path<RecurringTemplateId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let template = get_recurring_template(recurring_id, user_id, &connection)
        .inspect_err(|error| {
            tracing::error!("Could not get recurring transaction {recurring_id}: {error}")
        })?;
    let categories = CategoryOptions::for_kind(template.kind, &connection)?;

    Ok(edit_recurring_view(&template, &categories).into_response())
}

/// The form data for editing a recurring transaction.
#[derive(Debug, Deserialize)]
pub struct EditRecurringForm {
    pub name: String,
    /// The value of each occurrence in dollars.
    pub amount: f64,
    /// The name of a category of the recurring transaction's kind.
    pub category: String,
    pub frequency: String,
    /// The last date an occurrence may fall on, or `None` to repeat forever.
    pub end_date: Option<Date>,
    pub notes: Option<String>,
}

/// A route handler for updating a recurring transaction, redirects to the
/// recurring transactions view on success.
///
/// Transactions already created are not changed.
pub async fn edit_recurring_endpoint(
    State(state): State<EditRecurringState>,
    Extension(user_id): Extension<UserID>,
    Path(recurring_id): Path<RecurringTemplateId>,
    Form(form): Form<EditRecurringForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match update_from_form(recurring_id, user_id, form, &connection) {
        Ok(()) => (
            HxRedirect(endpoints::RECURRING_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::error!("Could not update recurring transaction {recurring_id}: {error}");
            error.into_alert_response()
        }
    }
}

fn update_from_form(
    recurring_id: RecurringTemplateId,
    user_id: UserID,
    form: EditRecurringForm,
    connection: &Connection,
) -> Result<(), Error> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    let amount = Amount::new(form.amount)?;
    let frequency: Frequency = form.frequency.parse()?;
    let category = CategoryName::new(&form.category)?;

    let kind = match get_recurring_template(recurring_id, user_id, connection) {
        Ok(template) => template.kind,
        Err(Error::NotFound) => return Err(Error::UpdateMissingRecurringTemplate),
        Err(error) => return Err(error),
    };
    validate_category(category.as_ref(), kind, connection)?;

    update_recurring_template(
        recurring_id,
        user_id,
        RecurringTemplateUpdate {
            name: name.to_owned(),
            amount,
            category: category.as_ref().to_owned(),
            frequency,
            end_date: form.end_date,
            notes: form
                .notes
                .map(|notes| notes.trim().to_owned())
                .filter(|notes| !notes.is_empty()),
        },
        connection,
    )
}


#[cfg(test)]
mod endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };
    use axum_extra::extract::Form;
    use time::macros::date;

    use crate::{
        Error, endpoints,
        recurring::{
            Frequency, RecurringTemplate, core::test_helpers::*, create_recurring_template,
            get_recurring_template,
        },
        test_utils::assert_hx_redirect,
        transaction::TransactionKind,
        user::UserID,
    };

    use super::{EditRecurringForm, EditRecurringState, edit_recurring_endpoint, update_from_form};

    fn get_test_state() -> (EditRecurringState, UserID, RecurringTemplate) {
        let (conn, user_id) = get_test_connection();
        let template = create_recurring_template(
            rent(user_id, Frequency::Monthly, date!(2025 - 01 - 15)),
            &conn,
        )
        .unwrap();

        let state = EditRecurringState {
            db_connection: Arc::new(Mutex::new(conn)),
        };

        (state, user_id, template)
    }

    fn form() -> EditRecurringForm {
        EditRecurringForm {
            name: "Flat rent".to_owned(),
            amount: 550.0,
            category: "Housing".to_owned(),
            frequency: "WEEKLY".to_owned(),
            end_date: Some(date!(2026 - 01 - 15)),
            notes: Some("New lease".to_owned()),
        }
    }

    #[tokio::test]
    async fn updates_template_and_redirects() {
        let (state, user_id, template) = get_test_state();

        let response = edit_recurring_endpoint(
            State(state.clone()),
            Extension(user_id),
            Path(template.id),
            Form(form()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::RECURRING_VIEW);

        let connection = state.db_connection.lock().unwrap();
        let got = get_recurring_template(template.id, user_id, &connection).unwrap();
        assert_eq!(got.name, "Flat rent");
        assert_eq!(got.amount.as_f64(), 550.0);
        assert_eq!(got.frequency, Frequency::Weekly);
        assert_eq!(got.end_date, Some(date!(2026 - 01 - 15)));
        assert_eq!(got.notes.as_deref(), Some("New lease"));
        assert_eq!(got.kind, TransactionKind::Expense);
        assert_eq!(got.next_occurrence, template.next_occurrence);
    }

    #[tokio::test]
    async fn rejects_category_of_another_kind() {
        let (state, user_id, template) = get_test_state();
        let connection = state.db_connection.lock().unwrap();

        let result = update_from_form(
            template.id,
            user_id,
            EditRecurringForm {
                category: "Salary".to_owned(),
                ..form()
            },
            &connection,
        );

        assert_eq!(
            result,
            Err(Error::InvalidCategory(
                "Salary".to_owned(),
                TransactionKind::Expense
            ))
        );
    }

    #[tokio::test]
    async fn rejects_invalid_fields() {
        let (state, user_id, template) = get_test_state();
        let connection = state.db_connection.lock().unwrap();
        let cases = [
            (
                EditRecurringForm {
                    name: "".to_owned(),
                    ..form()
                },
                Error::EmptyName,
            ),
            (
                EditRecurringForm {
                    amount: -5.0,
                    ..form()
                },
                Error::NonPositiveAmount(-5.0),
            ),
            (
                EditRecurringForm {
                    frequency: "HOURLY".to_owned(),
                    ..form()
                },
                Error::InvalidFrequency("HOURLY".to_owned()),
            ),
            (
                EditRecurringForm {
                    end_date: Some(date!(2025 - 01 - 14)),
                    ..form()
                },
                Error::EndDateBeforeStartDate {
                    start: date!(2025 - 01 - 15),
                    end: date!(2025 - 01 - 14),
                },
            ),
        ];

        for (form, want) in cases {
            assert_eq!(
                update_from_form(template.id, user_id, form, &connection),
                Err(want)
            );
        }

        let unchanged = get_recurring_template(template.id, user_id, &connection).unwrap();
        assert_eq!(unchanged, template);
    }

    #[tokio::test]
    async fn missing_template_is_not_found() {
        let (state, user_id, template) = get_test_state();

        let response = edit_recurring_endpoint(
            State(state),
            Extension(user_id),
            Path(template.id + 100),
            Form(form()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
