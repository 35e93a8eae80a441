mod communication;
mod worker;

use gryphon_routing::adapters::outbound::{init_file_logger, init_stderr_logger, MultiLogger};
use gryphon_routing::domains::DynLogger;
use gryphon_routing::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use worker::run_worker;

/// Reads JSON plan requests from stdin, one per line, and writes progress and
/// responses to stdout. All diagnostics go to stderr or the log file.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // stdout carries the protocol, so the file logger never mirrors to the console
    let stderr = init_stderr_logger("pathplan_worker");
    let logger: DynLogger = match config.logging.file.as_deref() {
        Some(path) => match init_file_logger(path, &config.logging.level, "pathplan_worker", false) {
            Ok(file) => Arc::new(MultiLogger::new(vec![file, stderr])),
            Err(e) => {
                stderr.warn(&e);
                stderr
            }
        },
        None => stderr,
    };

    run_worker(config, logger).await?;

    Ok(())
}
