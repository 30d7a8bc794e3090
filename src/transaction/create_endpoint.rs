//! Defines the endpoint for creating a new transaction or recurring transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    category::{CategoryName, validate_category},
    endpoints,
    recurring::{Frequency, RecurringTemplate, create_recurring_template, materialize_template},
    timezone::local_today,
    transaction::{Amount, Transaction, TransactionKind, create_transaction},
    user::UserID,
};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The form data for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct TransactionForm {
    /// A short description of the transaction.
    pub name: String,
    /// The value of the transaction in dollars.
    pub amount: f64,
    /// "INCOME" or "EXPENSE".
    pub kind: String,
    /// The name of a category for `kind`.
    pub category: String,
    /// When the transaction happened, or the first occurrence if it repeats.
    pub date: Date,
    pub notes: Option<String>,
    /// How often the transaction repeats, or `None` for a one-off transaction.
    pub frequency: Option<String>,
    /// The last date a repeating transaction may occur on.
    pub end_date: Option<Date>,
}

/// A route handler for creating a new transaction.
///
/// One-off transactions redirect to the transactions view. Repeating
/// transactions are stored as a recurring transaction, any occurrences up to
/// today are created straight away, then the client is redirected to the
/// recurring transactions view.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    Form(form): Form<TransactionForm>,
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

    match create_from_form(form, user_id, today, &connection) {
        Ok(redirect_endpoint) => (
            HxRedirect(redirect_endpoint.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::error!("could not create transaction: {error}");
            error.into_alert_response()
        }
    }
}

/// Validate the form and store it, returning the endpoint to redirect to.
fn create_from_form(
    form: TransactionForm,
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<&'static str, Error> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    let amount = Amount::new(form.amount)?;
    let kind: TransactionKind = form.kind.parse()?;
    let category = CategoryName::new(&form.category)?;
    validate_category(category.as_ref(), kind, connection)?;
    let notes = form
        .notes
        .map(|notes| notes.trim().to_owned())
        .filter(|notes| !notes.is_empty());

    let Some(frequency) = form.frequency else {
        if form.date > today {
            return Err(Error::FutureDate(form.date));
        }

        create_transaction(
            Transaction::build(user_id, name, amount, kind, category.as_ref(), form.date)
                .notes(notes),
            connection,
        )?;

        return Ok(endpoints::TRANSACTIONS_VIEW);
    };

    let frequency: Frequency = frequency.parse()?;
    let template = create_recurring_template(
        RecurringTemplate::build(
            user_id,
            name,
            amount,
            kind,
            category.as_ref(),
            frequency,
            form.date,
        )
        .end_date(form.end_date)
        .notes(notes),
        connection,
    )?;

    // The template is saved either way. Whatever was not created here is
    // picked up by the next sweep.
    match materialize_template(&template, today, connection) {
        Ok(count) => tracing::info!(
            "Created recurring transaction {} with {count} transactions up to {today}",
            template.id
        ),
        Err(failure) => tracing::error!("{failure}"),
    }

    Ok(endpoints::RECURRING_VIEW)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::State, http::StatusCode};
    use axum_extra::extract::Form;
    use rusqlite::Connection;
    use time::{Date, Duration, OffsetDateTime};

    use crate::{
        Error,
        db::initialize,
        endpoints,
        recurring::{Frequency, KindFilter, StatusFilter, list_recurring_templates},
        test_utils::{assert_hx_redirect, parse_html_fragment},
        transaction::{
            TransactionKind, count_transactions,
            create_endpoint::{CreateTransactionState, TransactionForm, create_from_form},
            create_transaction_endpoint, get_recent_transactions,
        },
        user::{UserID, create_user},
    };

    fn get_test_state() -> (CreateTransactionState, UserID) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("test", &conn).unwrap();

        let state = CreateTransactionState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        (state, user.id)
    }

    fn today() -> Date {
        OffsetDateTime::now_utc().date()
    }

    fn groceries_form(date: Date) -> TransactionForm {
        TransactionForm {
            name: "Supermarket".to_owned(),
            amount: 12.3,
            kind: "EXPENSE".to_owned(),
            category: "Groceries".to_owned(),
            date,
            notes: Some("  weekly shop ".to_owned()),
            frequency: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn can_create_transaction() {
        let (state, user_id) = get_test_state();

        let response = create_transaction_endpoint(
            State(state.clone()),
            Extension(user_id),
            Form(groceries_form(today())),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::TRANSACTIONS_VIEW);
        let connection = state.db_connection.lock().unwrap();
        let transactions = get_recent_transactions(user_id, 10, &connection).unwrap();
        assert_eq!(transactions.len(), 1);
        let transaction = &transactions[0];
        assert_eq!(transaction.name, "Supermarket");
        assert_eq!(transaction.amount.as_f64(), 12.3);
        assert_eq!(transaction.kind, TransactionKind::Expense);
        assert_eq!(transaction.notes.as_deref(), Some("weekly shop"));
        assert!(!transaction.is_recurring);
    }

    #[tokio::test]
    async fn one_off_transaction_cannot_be_in_the_future() {
        let (state, user_id) = get_test_state();
        let tomorrow = today() + Duration::days(1);

        let response = create_transaction_endpoint(
            State(state.clone()),
            Extension(user_id),
            Form(groceries_form(tomorrow)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = parse_html_fragment(response).await;
        assert!(
            html.root_element()
                .text()
                .any(|text| text.contains("Invalid transaction date"))
        );
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(count_transactions(user_id, &connection), Ok(0));
    }

    #[tokio::test]
    async fn recurring_transaction_is_seeded_and_redirects() {
        let (state, user_id) = get_test_state();
        let form = TransactionForm {
            name: "Rent".to_owned(),
            amount: 500.0,
            kind: "expense".to_owned(),
            category: "Housing".to_owned(),
            date: today() - Duration::days(14),
            notes: None,
            frequency: Some("WEEKLY".to_owned()),
            end_date: None,
        };

        let response =
            create_transaction_endpoint(State(state.clone()), Extension(user_id), Form(form))
                .await;

        assert_hx_redirect(&response, endpoints::RECURRING_VIEW);
        let connection = state.db_connection.lock().unwrap();
        let templates = list_recurring_templates(
            user_id,
            StatusFilter::All,
            KindFilter::All,
            &connection,
        )
        .unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].frequency, Frequency::Weekly);
        assert_eq!(templates[0].next_occurrence, today() + Duration::days(7));
        let transactions = get_recent_transactions(user_id, 10, &connection).unwrap();
        assert_eq!(transactions.len(), 3);
        assert!(
            transactions
                .iter()
                .all(|transaction| transaction.recurring_template_id == Some(templates[0].id))
        );
    }

    #[tokio::test]
    async fn recurring_transaction_may_start_in_the_future() {
        let (state, user_id) = get_test_state();
        let start_date = today() + Duration::days(3);
        let form = TransactionForm {
            frequency: Some("MONTHLY".to_owned()),
            ..groceries_form(start_date)
        };

        let connection = state.db_connection.lock().unwrap();
        let result = create_from_form(form, user_id, today(), &connection);

        assert_eq!(result, Ok(endpoints::RECURRING_VIEW));
        assert_eq!(count_transactions(user_id, &connection), Ok(0));
        let templates = list_recurring_templates(
            user_id,
            StatusFilter::Active,
            KindFilter::Expense,
            &connection,
        )
        .unwrap();
        assert_eq!(templates[0].next_occurrence, start_date);
    }

    #[tokio::test]
    async fn rejects_invalid_fields() {
        let (state, user_id) = get_test_state();
        let connection = state.db_connection.lock().unwrap();
        let cases = [
            (
                TransactionForm {
                    name: "   ".to_owned(),
                    ..groceries_form(today())
                },
                Error::EmptyName,
            ),
            (
                TransactionForm {
                    amount: 0.0,
                    ..groceries_form(today())
                },
                Error::NonPositiveAmount(0.0),
            ),
            (
                TransactionForm {
                    kind: "TRANSFER".to_owned(),
                    ..groceries_form(today())
                },
                Error::InvalidTransactionKind("TRANSFER".to_owned()),
            ),
            (
                TransactionForm {
                    category: "Salary".to_owned(),
                    ..groceries_form(today())
                },
                Error::InvalidCategory("Salary".to_owned(), TransactionKind::Expense),
            ),
            (
                TransactionForm {
                    category: " ".to_owned(),
                    ..groceries_form(today())
                },
                Error::EmptyCategoryName,
            ),
            (
                TransactionForm {
                    frequency: Some("FORTNIGHTLY".to_owned()),
                    ..groceries_form(today())
                },
                Error::InvalidFrequency("FORTNIGHTLY".to_owned()),
            ),
            (
                TransactionForm {
                    frequency: Some("DAILY".to_owned()),
                    end_date: Some(today() - Duration::days(1)),
                    ..groceries_form(today())
                },
                Error::EndDateBeforeStartDate {
                    start: today(),
                    end: today() - Duration::days(1),
                },
            ),
        ];

        for (form, want) in cases {
            let result = create_from_form(form, user_id, today(), &connection);

            assert_eq!(result, Err(want));
        }

        assert_eq!(count_transactions(user_id, &connection), Ok(0));
    }
}
