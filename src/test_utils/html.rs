use axum::{body::Body, response::Response};
use scraper::Html;

pub(crate) async fn parse_html_document(response: Response<Body>) -> Html {
    let body = response.into_body();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Could not get response body");
    let text = String::from_utf8_lossy(&body).to_string();

    Html::parse_document(&text)
}

pub(crate) async fn parse_html_fragment(response: Response<Body>) -> Html {
    let body = response.into_body();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Could not get response body");
    let text = String::from_utf8_lossy(&body).to_string();

    Html::parse_fragment(&text)
}

/// Parse a response made of a table row and any out-of-band elements.
///
/// Table rows are dropped when parsed outside of a table, so the response is
/// wrapped in one. Out-of-band elements are moved in front of the table.
pub(crate) async fn parse_table_row_fragment(response: Response<Body>) -> Html {
    let body = response.into_body();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Could not get response body");
    let text = String::from_utf8_lossy(&body).to_string();

    Html::parse_fragment(&format!("<table><tbody>{text}</tbody></table>"))
}

#[track_caller]
pub(crate) fn assert_valid_html(html: &Html) {
    assert!(
        html.errors.is_empty(),
        "Got HTML parsing errors: {:?}",
        html.errors
    );
}
