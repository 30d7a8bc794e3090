//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/recurring/{recurring_id}/edit', use [format_endpoint].

/// The root route which redirects to the transactions page.
pub const ROOT: &str = "/";
/// The page for displaying a user's transactions.
pub const TRANSACTIONS_VIEW: &str = "/transactions";
/// The page for creating a new transaction, one-off or recurring.
pub const NEW_TRANSACTION_VIEW: &str = "/transactions/new";
/// The page for editing a transaction.
pub const EDIT_TRANSACTION_VIEW: &str = "/transactions/{transaction_id}/edit";
/// The page for listing recurring transactions.
pub const RECURRING_VIEW: &str = "/recurring";
/// The page for editing a recurring transaction.
pub const EDIT_RECURRING_VIEW: &str = "/recurring/{recurring_id}/edit";
/// The page that previews upcoming recurring transactions.
pub const RECURRING_PREVIEW_VIEW: &str = "/recurring/preview";
/// The page for setting the monthly budget and showing spending against it.
pub const BUDGET_VIEW: &str = "/budget";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route to create transactions.
pub const TRANSACTIONS_API: &str = "/api/transactions";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to update or delete a recurring transaction.
pub const RECURRING_TRANSACTION: &str = "/api/recurring/{recurring_id}";
/// The route to pause or resume a recurring transaction.
pub const TOGGLE_RECURRING: &str = "/api/recurring/{recurring_id}/toggle";
/// The route for the upcoming recurring transactions as JSON.
pub const RECURRING_PREVIEW_API: &str = "/api/recurring/preview";
/// The route to get, save or remove the monthly budget.
pub const BUDGET_API: &str = "/api/budget";
/// The route for this month's spending against the budget as JSON.
pub const BUDGET_STATUS_API: &str = "/api/budget/status";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
