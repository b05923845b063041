use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use opdispatch::config::Config;
use opdispatch::platform::{self, Platform};
use opdispatch::server::{self, AppState};
use opdispatch::{logger, Dispatcher};

mod demo;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let cfg = Config::load()?;
    logger::init(&cfg.logging)?;

    let platform = cfg
        .dispatch
        .platform
        .unwrap_or_else(platform::from_process_env);
    let dispatcher = demo::dispatcher(&cfg.dispatch);
    dispatcher.operations().validate(dispatcher.mode())?;
    tracing::info!(%platform, mode = %dispatcher.mode(), "dispatcher ready");

    // Build the Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        tracing::info!("[CONFIG] Using {workers} worker threads");
    } else {
        tracing::info!("[CONFIG] Using default worker threads (CPU cores)");
    }
    let runtime = runtime_builder.build()?;

    if platform.is_event_driven() {
        runtime.block_on(run_single_event(platform, &dispatcher))
    } else {
        runtime.block_on(async_main(cfg, dispatcher))
    }
}

/// Local invocation: one event document on stdin, the response on stdout
async fn run_single_event(platform: Platform, dispatcher: &Dispatcher) -> Result<(), BoxError> {
    let mut event = String::new();
    tokio::io::stdin().read_to_string(&mut event).await?;
    let output = platform::run_json_event(platform, dispatcher, &event).await?;
    println!("{output}");
    Ok(())
}

async fn async_main(cfg: Config, dispatcher: Dispatcher) -> Result<(), BoxError> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    logger::log_server_start(&addr, &cfg, dispatcher.operations().len());
    tracing::info!("[CONFIG] Max body size: {} bytes", cfg.http.max_body_size);
    tracing::info!("[CONFIG] Max connections: {:?}", cfg.performance.max_connections);

    let state = Arc::new(AppState::new(cfg, dispatcher));
    let active_connections = Arc::new(AtomicUsize::new(0));

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(listener, state, active_connections))
        .await
}
