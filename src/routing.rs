//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{get, post, put},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{auth_guard, auth_guard_hx},
    budget::{
        delete_budget_endpoint, get_budget_json, get_budget_page, get_budget_status_json,
        save_budget_endpoint,
    },
    endpoints,
    internal_server_error::get_internal_server_error_page,
    not_found::get_404_not_found,
    recurring::{
        delete_recurring_endpoint, edit_recurring_endpoint, get_edit_recurring_page,
        get_preview_json, get_preview_page, get_recurring_page, toggle_recurring_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, edit_transaction_endpoint,
        get_create_transaction_page, get_edit_transaction_page, get_transactions_page,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new().route(
        endpoints::INTERNAL_ERROR_VIEW,
        get(get_internal_server_error_page),
    );

    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::TRANSACTIONS_VIEW, get(get_transactions_page))
        .route(
            endpoints::NEW_TRANSACTION_VIEW,
            get(get_create_transaction_page),
        )
        .route(
            endpoints::EDIT_TRANSACTION_VIEW,
            get(get_edit_transaction_page),
        )
        .route(endpoints::RECURRING_VIEW, get(get_recurring_page))
        .route(endpoints::EDIT_RECURRING_VIEW, get(get_edit_recurring_page))
        .route(endpoints::RECURRING_PREVIEW_VIEW, get(get_preview_page))
        .route(endpoints::BUDGET_VIEW, get(get_budget_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // API routes are called by HTMX, so rejected requests get an alert instead of a page.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(
                endpoints::TRANSACTIONS_API,
                post(create_transaction_endpoint),
            )
            .route(
                endpoints::TRANSACTION,
                put(edit_transaction_endpoint).delete(delete_transaction_endpoint),
            )
            .route(
                endpoints::RECURRING_TRANSACTION,
                put(edit_recurring_endpoint).delete(delete_recurring_endpoint),
            )
            .route(endpoints::TOGGLE_RECURRING, post(toggle_recurring_endpoint))
            .route(endpoints::RECURRING_PREVIEW_API, get(get_preview_json))
            .route(
                endpoints::BUDGET_API,
                get(get_budget_json)
                    .post(save_budget_endpoint)
                    .delete(delete_budget_endpoint),
            )
            .route(endpoints::BUDGET_STATUS_API, get(get_budget_status_json))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
    );

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the transactions page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::TRANSACTIONS_VIEW)
}

#[cfg(test)]
mod root_route_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{endpoints, routing::get_index_page};

    #[tokio::test]
    async fn root_redirects_to_transactions() {
        let response = get_index_page().await.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get("location").unwrap();
        assert_eq!(location, endpoints::TRANSACTIONS_VIEW);
    }
}
