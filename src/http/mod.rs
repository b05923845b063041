//! HTTP protocol layer module
//!
//! The request and response shapes shared by the dispatcher and every
//! platform adapter, decoupled from any specific platform.

pub mod request;
pub mod response;

// Re-export commonly used types
pub use request::{is_json_content_type, lowercase_headers, parse_query, Body, CallContext, Request};
pub use response::{
    build_500_response, build_503_response, into_hyper_response, Response, ResponseSink,
    JSON_CONTENT_TYPE,
};
