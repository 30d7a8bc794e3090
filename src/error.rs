//! Defines the app level error type and conversions to rendered HTML pages and alerts.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use time::Date;

use crate::{
    alert::Alert, internal_server_error::InternalServerError, not_found::NotFoundError,
    recurring::RecurringTemplateId, transaction::TransactionKind,
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The auth token cookie is missing from the cookie jar in the request.
    #[error("no auth token in the cookie jar")]
    CookieMissing,

    /// The auth token could not be parsed or has expired.
    #[error("the auth token is invalid or has expired")]
    InvalidToken,

    /// An empty string was used to name a transaction or recurring transaction.
    #[error("Name cannot be empty")]
    EmptyName,

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// An amount of zero or less was used for a transaction.
    ///
    /// Whether money was spent or earned is recorded by the transaction kind,
    /// so amounts are always positive.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    NonPositiveAmount(f64),

    /// The category does not exist for the given transaction kind.
    #[error("\"{0}\" is not a valid {1} category")]
    InvalidCategory(String, TransactionKind),

    /// The text could not be parsed as a transaction kind.
    #[error("\"{0}\" is not a valid transaction kind")]
    InvalidTransactionKind(String),

    /// The text could not be parsed as a recurring frequency.
    #[error("\"{0}\" is not a valid frequency")]
    InvalidFrequency(String),

    /// The end date of a recurring transaction is before its start date.
    #[error("the end date {end} is before the start date {start}")]
    EndDateBeforeStartDate {
        /// The first date the recurring transaction occurs on.
        start: Date,
        /// The last date the recurring transaction may occur on.
        end: Date,
    },

    /// A date in the future was used to create a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed. Recurring transactions may start in the future.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// The recurring transaction ID used to create a transaction did not
    /// match a valid recurring transaction.
    #[error("the ID {0:?} does not refer to a valid recurring transaction")]
    InvalidRecurringTemplate(Option<RecurringTemplateId>),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to update a recurring transaction that does not exist
    #[error("tried to update a recurring transaction that is not in the database")]
    UpdateMissingRecurringTemplate,

    /// Tried to delete a recurring transaction that does not exist
    #[error("tried to delete a recurring transaction that is not in the database")]
    DeleteMissingRecurringTemplate,

    /// A monthly budget of zero or less was submitted.
    #[error("{0} is not a valid budget, the monthly budget must be greater than zero")]
    InvalidBudgetAmount(f64),

    /// A category limit could not be parsed or was negative.
    #[error("\"{limit}\" is not a valid limit for {category}, limits cannot be negative")]
    InvalidCategoryLimit {
        /// The category the limit was entered for.
        category: String,
        /// The text that was submitted as the limit.
        limit: String,
    },

    /// The same category was given more than one limit.
    #[error("{0} has more than one limit")]
    DuplicateCategoryLimit(String),

    /// The category limits add up to more than the monthly budget.
    #[error("category limits (${limits:.2}) exceed the total budget (${budget:.2})")]
    CategoryLimitsExceedBudget {
        /// The sum of the category limits.
        limits: f64,
        /// The monthly budget.
        budget: f64,
    },

    /// Tried to delete a budget when none is active
    #[error("tried to delete a budget when there is no active budget")]
    DeleteMissingBudget,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => NotFoundError.into_response(),
            Error::CookieMissing | Error::InvalidToken => InternalServerError {
                status_code: StatusCode::UNAUTHORIZED,
                header: "401",
                description: "Log In Required",
                fix: "Your session is missing or has expired. Log in again to continue.",
            }
            .into_response(),
            Error::InvalidTimezoneError(timezone) => InternalServerError {
                description: "Invalid Timezone Settings",
                fix: &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
                ..Default::default()
            }
            .into_response(),
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// Convert the error into an HTTP response with an HTML alert.
    pub fn into_alert_response(self) -> Response {
        let (status_code, alert) = match self {
            Error::CookieMissing | Error::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                Alert::Error {
                    message: "Log in required".to_owned(),
                    details: "Your session is missing or has expired. Log in again to continue."
                        .to_owned(),
                },
            ),
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Invalid Timezone Settings".to_owned(),
                    details: format!(
                        "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                    ),
                },
            ),
            Error::FutureDate(date) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid transaction date".to_owned(),
                    details: format!(
                        "{date} is a date in the future, which is not allowed. \
                        Change the date to today or earlier, or make the transaction recurring."
                    ),
                },
            ),
            error @ (Error::EmptyName
            | Error::EmptyCategoryName
            | Error::NonPositiveAmount(_)
            | Error::InvalidTransactionKind(_)
            | Error::InvalidFrequency(_)) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid transaction".to_owned(),
                    details: error.to_string(),
                },
            ),
            Error::InvalidCategory(name, kind) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid category".to_owned(),
                    details: format!(
                        "Could not find the {kind} category \"{name}\". \
                        Choose one of the listed categories."
                    ),
                },
            ),
            error @ Error::EndDateBeforeStartDate { .. } => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid end date".to_owned(),
                    details: error.to_string(),
                },
            ),
            Error::DeleteMissingTransaction => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not delete transaction".to_owned(),
                    details: "The transaction could not be found. \
                    Try refreshing the page to see if the transaction has already been deleted."
                        .to_owned(),
                },
            ),
            error @ (Error::InvalidBudgetAmount(_)
            | Error::InvalidCategoryLimit { .. }
            | Error::DuplicateCategoryLimit(_)
            | Error::CategoryLimitsExceedBudget { .. }) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid budget".to_owned(),
                    details: error.to_string(),
                },
            ),
            Error::UpdateMissingTransaction => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not update transaction".to_owned(),
                    details: "The transaction could not be found. \
                    Try refreshing the page to see if it has been deleted."
                        .to_owned(),
                },
            ),
            Error::UpdateMissingRecurringTemplate => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not update recurring transaction".to_owned(),
                    details: "The recurring transaction could not be found.".to_owned(),
                },
            ),
            Error::DeleteMissingRecurringTemplate => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not delete recurring transaction".to_owned(),
                    details: "The recurring transaction could not be found. \
                    Try refreshing the page to see if it has already been deleted."
                        .to_owned(),
                },
            ),
            Error::DeleteMissingBudget => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not remove budget".to_owned(),
                    details: "There is no budget to remove.".to_owned(),
                },
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Something went wrong".to_owned(),
                    details:
                        "An unexpected error occurred, check the server logs for more details."
                            .to_owned(),
                },
            ),
        };

        (status_code, alert.into_html()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::{
        Error,
        test_utils::{assert_valid_html, parse_html_fragment},
    };

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[tokio::test]
    async fn validation_errors_render_bad_request_alerts() {
        let response = Error::NonPositiveAmount(0.0).into_alert_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = parse_html_fragment(response).await;
        assert_valid_html(&html);
    }

    #[test]
    fn budget_limits_error_shows_both_totals() {
        let error = Error::CategoryLimitsExceedBudget {
            limits: 1200.0,
            budget: 1000.0,
        };

        assert_eq!(
            error.to_string(),
            "category limits ($1200.00) exceed the total budget ($1000.00)"
        );
    }

    #[tokio::test]
    async fn budget_errors_render_bad_request_alerts() {
        let response = Error::InvalidBudgetAmount(0.0).into_alert_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_token_renders_unauthorized_page() {
        let response = axum::response::IntoResponse::into_response(Error::CookieMissing);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
