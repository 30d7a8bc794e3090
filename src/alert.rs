//! Alert system for displaying success and error messages to users.
//!
//! Alerts are HTML fragments that HTMX swaps into the `#alert-container`
//! element of the base page.

use axum::response::{Html, IntoResponse, Response};
use maud::{Markup, html};

/// An alert message shown to the user after an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// The action succeeded, with extra details.
    Success { message: String, details: String },
    /// The action succeeded.
    SuccessSimple { message: String },
    /// The action failed, with details on how to fix it.
    Error { message: String, details: String },
}

impl Alert {
    /// Render the alert as an HTML fragment.
    pub fn into_html(self) -> Html<String> {
        Html(self.into_markup().into_string())
    }

    fn into_markup(self) -> Markup {
        let (is_error, message, details) = match self {
            Alert::Success { message, details } => (false, message, details),
            Alert::SuccessSimple { message } => (false, message, String::new()),
            Alert::Error { message, details } => (true, message, details),
        };

        let container_style = if is_error {
            "p-4 mb-4 text-sm text-red-800 rounded-lg bg-red-50 dark:bg-gray-800 dark:text-red-400"
        } else {
            "p-4 mb-4 text-sm text-green-800 rounded-lg bg-green-50 dark:bg-gray-800 dark:text-green-400"
        };

        html! {
            div
                id="alert-container"
                hx-swap-oob="true"
                class="w-full max-w-md px-4"
                style="position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%); z-index: 9999;"
            {
                div role="alert" class=(container_style)
                {
                    p class="font-medium" { (message) }

                    @if !details.is_empty() {
                        p { (details) }
                    }

                    button
                        type="button"
                        class="mt-2 underline"
                        onclick="this.closest('#alert-container').classList.add('hidden')"
                    {
                        "Dismiss"
                    }
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::Alert;

    #[test]
    fn error_alert_shows_message_then_details() {
        let alert = Alert::Error {
            message: "Could not delete".to_owned(),
            details: "Not found".to_owned(),
        };

        let html = Html::parse_fragment(&alert.into_html().0);

        assert!(html.errors.is_empty(), "{:?}", html.errors);
        let paragraphs: Vec<String> = html
            .select(&Selector::parse("p").unwrap())
            .map(|p| p.text().collect::<String>())
            .collect();
        assert_eq!(paragraphs, vec!["Could not delete", "Not found"]);
    }

    #[test]
    fn simple_alert_has_no_details() {
        let alert = Alert::SuccessSimple {
            message: "Deleted".to_owned(),
        };

        let html = Html::parse_fragment(&alert.into_html().0);

        let count = html.select(&Selector::parse("p").unwrap()).count();
        assert_eq!(count, 1);
    }
}
