//! Budgeteur Recurring is a web app for tracking income and expenses,
//! including transactions that repeat on a schedule, against a monthly budget.
//!
//! This library provides a REST API that directly serves HTML pages, and the
//! recurring transaction engine that turns scheduled templates into
//! transactions.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod auth;
mod budget;
mod category;
mod database_id;
mod db;
mod endpoints;
mod error;
mod html;
mod internal_server_error;
mod logging;
mod navigation;
mod not_found;
mod recurring;
mod routing;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{DEFAULT_COOKIE_DURATION, Token, set_auth_cookie};
pub use category::{Category, CategoryName};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use recurring::{
    Frequency, RecurringTemplate, RecurringTemplateBuilder, StartupSweep, SweepFailure,
    SweepReport, create_recurring_template, materialize_template, next_occurrence, run_sweep,
    run_startup_sweep, run_sweep_periodically,
};
pub use routing::build_router;
pub use timezone::{get_local_offset, local_today};
pub use transaction::{Amount, Transaction, TransactionBuilder, TransactionKind};
pub use user::{User, UserID, create_user};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
