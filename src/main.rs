//! The REST API server for the household ledger.

use std::{
    fs::OpenOptions,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use household_ledger::{AppState, build_router, graceful_shutdown};

/// The REST API server for the household ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The IP address to serve the API from.
    #[arg(long, default_value = "127.0.0.1")]
    address: IpAddr,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::new(args.address, args.port);

    let connection = Connection::open(&args.db_path).expect("Could not open database file");
    let state = AppState::new(connection).expect("Could not initialize database");

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Could not start server");
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

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

#[cfg(test)]
mod args_tests {
    use std::net::{IpAddr, Ipv4Addr};

    use clap::Parser;

    use super::Args;

    #[test]
    fn address_and_port_default_to_localhost_3000() {
        let args = Args::parse_from(["server", "--db-path", "ledger.db"]);

        assert_eq!(args.address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(args.port, 3000);
    }

    #[test]
    fn address_and_port_can_be_overridden() {
        let args = Args::parse_from([
            "server",
            "--db-path",
            "ledger.db",
            "--address",
            "0.0.0.0",
            "--port",
            "8080",
        ]);

        assert_eq!(args.address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(args.port, 8080);
    }
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

    router.layer(tracing_layer)
}
