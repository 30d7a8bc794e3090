use std::{
    env::{self},
    fs::OpenOptions,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use budgeteur_recurring::{
    AppState, build_router, get_local_offset, graceful_shutdown, logging_middleware,
    run_startup_sweep, run_sweep_periodically,
};

/// The web server for Budgeteur Recurring.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the app from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the timezone used to decide what "today" is,
    /// e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    local_timezone: String,

    /// Re-run the recurring transaction sweep every this many minutes while
    /// the server is running. By default the sweep only runs at startup.
    #[arg(long)]
    sweep_interval_minutes: Option<u64>,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    if get_local_offset(&args.local_timezone).is_none() {
        tracing::error!("Invalid timezone {}", args.local_timezone);
        return;
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let secret = env::var("SECRET").expect("The environment variable 'SECRET' must be set");

    let conn = Connection::open(&args.db_path).expect("Could not open the database");
    let state = AppState::new(conn, &secret, &args.local_timezone)
        .expect("Could not initialize the database");

    match run_startup_sweep(&state) {
        Ok(Some(report)) if !report.failures.is_empty() => tracing::warn!(
            "Startup sweep finished with {} failed recurring transactions",
            report.failures.len()
        ),
        Ok(_) => {}
        Err(error) => tracing::error!("Startup sweep failed: {error}"),
    }

    if let Some(minutes) = args.sweep_interval_minutes.filter(|minutes| *minutes > 0) {
        tracing::info!("Sweeping recurring transactions every {minutes} minutes");
        tokio::spawn(run_sweep_periodically(
            state.clone(),
            Duration::from_secs(minutes * 60),
        ));
    }

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly");
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    // RUST_LOG overrides the default levels, e.g. RUST_LOG=budgeteur_recurring=trace.
    let env_filter = EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::DEBUG.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(env_filter),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router
        .layer(middleware::from_fn(logging_middleware))
        .layer(tracing_layer)
}
