//! Logger module
//!
//! Thin facade over `tracing` covering:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Dispatch failures and other errors and warnings

mod format;

pub use format::AccessLogEntry;

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::{Config, LoggingConfig};
use crate::dispatch::DispatchError;
use crate::http::Request;

/// Install the global subscriber
///
/// Should be called once at application startup. `RUST_LOG` takes
/// precedence over `logging.level`. Returns an error if a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, operations: usize) {
    tracing::info!("======================================");
    tracing::info!("Dispatch server started successfully");
    tracing::info!("Listening on: http://{addr}");
    tracing::info!("Log level: {}", config.logging.level);
    tracing::info!("Dispatch mode: {}", config.dispatch.mode);
    tracing::info!("Registered operations: {operations}");
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    tracing::info!("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!(%peer_addr, "[Connection] Accepted");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("[ERROR] Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("[ERROR] {message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("[WARN] {message}");
}

/// Errors the default error handler maps to 500
pub fn log_dispatch_failure(req: &Request, err: &DispatchError) {
    let source = std::error::Error::source(err).map(ToString::to_string);
    tracing::error!(
        method = %req.method,
        path = req.target_path(),
        kind = %err.kind(),
        source = source.as_deref().unwrap_or("-"),
        "{}",
        err.message()
    );
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}
