//! Runs the standard probe suite against a live endpoint.
//!
//! Run with: cargo run --bin wsprobe
//! Point it elsewhere with: WSPROBE_ENDPOINT=ws://127.0.0.1:9001 cargo run --bin wsprobe
//! Log verbosity follows RUST_LOG (default: info).

use std::error::Error;
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wsprobe::{Config, Suite, SystemClock, WsConnector};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    info!(
        endpoint = %config.endpoint,
        threshold = ?config.latency_threshold,
        "probing"
    );

    let report = Suite::standard(&config, WsConnector::new(), SystemClock)
        .run()
        .await;
    println!("{report}");

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
