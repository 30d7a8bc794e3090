//! Middleware for logging requests and responses.

use axum::{body::Body, extract::Request, middleware::Next, response::Response};

/// The number of characters of a request or response body logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_text = read_body_text(body).await;
    log_request(&parts, &body_text);

    let request = Request::from_parts(parts, body_text.into());
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_text = read_body_text(body).await;
    log_response(&parts, &body_text);

    Response::from_parts(parts, body_text.into())
}

async fn read_body_text(body: Body) -> String {
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(error) => {
            tracing::error!("Could not read body for logging: {error}");
            String::new()
        }
    }
}

/// The first [LOG_BODY_LENGTH_LIMIT] characters of `body`, or `None` if it is short enough to log whole.
fn truncate_body(body: &str) -> Option<&str> {
    body.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &body[..end])
}

fn log_request(parts: &axum::http::request::Parts, body: &str) {
    match truncate_body(body) {
        Some(truncated) => {
            tracing::info!("Received request: {parts:#?}\nbody: {truncated}...");
            tracing::debug!("Full request body: {body:?}");
        }
        None => tracing::info!("Received request: {parts:#?}\nbody: {body:?}"),
    }
}

fn log_response(parts: &axum::http::response::Parts, body: &str) {
    match truncate_body(body) {
        Some(truncated) => {
            tracing::info!("Sending response: {parts:#?}\nbody: {truncated}...");
            tracing::debug!("Full response body: {body:?}");
        }
        None => tracing::info!("Sending response: {parts:#?}\nbody: {body:?}"),
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, middleware, routing::post};
    use axum_test::TestServer;

    use super::{LOG_BODY_LENGTH_LIMIT, logging_middleware, truncate_body};

    #[test]
    fn short_body_is_not_truncated() {
        assert_eq!(truncate_body("name=Rent&amount=500"), None);
    }

    #[test]
    fn long_body_is_truncated_on_a_char_boundary() {
        let body = "é".repeat(LOG_BODY_LENGTH_LIMIT + 10);

        let truncated = truncate_body(&body).unwrap();

        assert_eq!(truncated.chars().count(), LOG_BODY_LENGTH_LIMIT);
    }

    #[tokio::test]
    async fn middleware_passes_body_through() {
        let app = Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::new(app);
        let body = "x".repeat(LOG_BODY_LENGTH_LIMIT * 2);

        let response = server.post("/echo").text(body.clone()).await;

        response.assert_status_ok();
        response.assert_text(body);
    }
}
