// Server loop module
// Accepts connections until Ctrl-C

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::AppState;
use crate::logger;

/// Accept connections and hand each to its own task.
///
/// Must run inside a `LocalSet`; connections are served with `spawn_local`.
/// Returns once Ctrl-C is received. Connections still in flight are left
/// to finish on their own.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            signal = &mut shutdown => {
                signal?;
                tracing::info!(
                    active = active_connections.load(Ordering::SeqCst),
                    "shutdown requested, no longer accepting connections"
                );
                return Ok(());
            }
        }
    }
}
