//! Single-operation request dispatch
//!
//! The first path segment of a request names an operation; the remaining
//! segments are its positional arguments. A [`Dispatcher`] resolves the
//! operation in a fixed handler table, runs global and per-operation
//! middleware, invokes the handler and turns failures into responses. The
//! same dispatcher can be fronted by a plain HTTP server or by serverless
//! event adapters.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod logger;
pub mod platform;
pub mod server;

pub use dispatch::{
    arity, arity_range, to_reply, Continuation, DispatchError, Dispatcher, ErrorKind, Flow, Handler,
    HandlerResult, Middleware, Mode, Operations, Options, Reply, Route,
};
pub use http::{Body, CallContext, Request, Response, ResponseSink};
pub use platform::Platform;
