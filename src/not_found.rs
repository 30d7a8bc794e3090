//! The page to display when a route or resource does not exist.
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

/// Renders the 404 page.
pub struct NotFoundError;

impl IntoResponse for NotFoundError {
    fn into_response(self) -> Response {
        let page = error_view(
            "Not Found",
            "404",
            "Something's missing.",
            "Sorry, we can't find that page. You'll find lots to explore on the home page.",
        );

        (StatusCode::NOT_FOUND, Html(page.into_string())).into_response()
    }
}

pub async fn get_404_not_found() -> Response {
    NotFoundError.into_response()
}
