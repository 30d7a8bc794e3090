//! Runs the sweep when the server starts and, optionally, on a timer.

use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error,
    recurring::materializer::{SweepReport, log_sweep_report, run_sweep},
    timezone::local_today,
};

/// Guards the catch-up sweep so that it runs once per process.
#[derive(Debug, Default)]
pub struct StartupSweep {
    has_run: AtomicBool,
}

impl StartupSweep {
    /// Create a guard for a sweep that has not run yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the sweep if this is the first call, otherwise return `None`.
    pub fn run_once(
        &self,
        today: Date,
        connection: &Connection,
    ) -> Option<Result<SweepReport, Error>> {
        if self.has_run.swap(true, Ordering::SeqCst) {
            return None;
        }

        Some(run_sweep(today, connection))
    }

    /// Whether [StartupSweep::run_once] has been called.
    pub fn has_run(&self) -> bool {
        self.has_run.load(Ordering::SeqCst)
    }
}

/// Create the transactions for recurring transactions that came due while
/// the server was not running.
///
/// Uses today's date in the server's local timezone. Does nothing and
/// returns `Ok(None)` if the startup sweep already ran.
///
/// # Errors
/// Returns an error if the timezone is invalid, the database lock is
/// poisoned, or the due recurring transactions could not be queried.
pub fn run_startup_sweep(state: &AppState) -> Result<Option<SweepReport>, Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    match state.startup_sweep.run_once(today, &connection) {
        Some(result) => {
            let report = result?;
            log_sweep_report(&report);
            Ok(Some(report))
        }
        None => {
            tracing::debug!("Startup sweep already ran, skipping");
            Ok(None)
        }
    }
}

/// Re-run the sweep every `period` until the task is dropped.
///
/// The first sweep happens one `period` after this is called, since the
/// startup sweep covers the time before that.
pub async fn run_sweep_periodically(state: AppState, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        if let Err(error) = sweep_now(&state) {
            tracing::error!("Periodic recurring transaction sweep failed: {error}");
        }
    }
}

fn sweep_now(state: &AppState) -> Result<(), Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let report = run_sweep(today, &connection)?;
    log_sweep_report(&report);

    Ok(())
}
