// Server module entry point
// HTTP front end for the dispatcher: listener, per-connection service, accept loop

pub mod connection;
pub mod listener;
mod state;

// `loop` is a keyword, so the module is named server_loop
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_reusable_listener;
pub use server_loop::start_server_loop;
pub use state::AppState;
