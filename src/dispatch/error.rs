//! Dispatch errors and the default terminal error handler
//!
//! Every failure in the pipeline (parse, lookup, configuration, middleware,
//! handler, rejected future, panic) becomes a [`DispatchError`] and travels
//! through the same error channel.

use std::any::Any;
use std::fmt;

use serde_json::json;

use crate::http::{Request, ResponseSink};
use crate::logger;

/// Boxed source error carried by a [`DispatchError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Name used by authentication middleware for rejected credentials
pub const UNAUTHORIZED_NAME: &str = "UnauthorizedError";

/// Machine-readable classification of a dispatch failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path carried no operation name
    NoOperation,
    /// No handler is registered for the operation
    NotFound,
    /// The handler table entry cannot be invoked
    InvalidConfig,
    /// Wrong number of arguments or unreadable input
    InvalidInput,
    /// A positional handler resolved to `null`
    NullResponse,
    /// Authentication failed
    Unauthorized,
    /// Caller-supplied error with an explicit status
    Http,
    /// Unclassified failure
    Internal,
    /// Caller-supplied error name, e.g. from a third-party middleware
    Named(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoOperation => "NoOperation",
            Self::NotFound => "NotFound",
            Self::InvalidConfig => "InvalidConfig",
            Self::InvalidInput => "InvalidInput",
            Self::NullResponse => "NullResponse",
            Self::Unauthorized => UNAUTHORIZED_NAME,
            Self::Http => "HttpError",
            Self::Internal => "Error",
            Self::Named(name) => name.as_str(),
        }
    }

    /// Status used when the error does not carry one explicitly
    pub fn default_status(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::Unauthorized => 401,
            Self::NoOperation => 403,
            Self::NotFound | Self::NullResponse => 404,
            Self::Named(name) if name == UNAUTHORIZED_NAME => 401,
            Self::InvalidConfig | Self::Http | Self::Internal | Self::Named(_) => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value flowing through the middleware error channel
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DispatchError {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            source: None,
        }
    }

    /// Error carrying an explicit HTTP status, e.g. a handler's 400 or 403
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Http,
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Named(name.into()), message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Wrap an arbitrary error as an unclassified 500
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: ErrorKind::Internal,
            status: None,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Convert a caught panic payload into an error
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::new(ErrorKind::Internal, detail)
    }

    #[must_use]
    pub fn status_override(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Explicit status if one was set, otherwise the kind's default
    pub fn status(&self) -> u16 {
        self.status.unwrap_or_else(|| self.kind.default_status())
    }

    pub const fn has_explicit_status(&self) -> bool {
        self.status.is_some()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind.as_str() == UNAUTHORIZED_NAME
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err)
    }
}

/// Terminal error-to-response translator
pub type ErrorHandler =
    std::sync::Arc<dyn Fn(&DispatchError, &Request, &mut dyn ResponseSink) + Send + Sync>;

/// Default error handler
///
/// - authentication failures: 401 with an empty body
/// - statuses below 500: that status with `{"message": ...}`
/// - everything else: logged, then 500 with `{"message": ...}`
pub fn default_error_handler(err: &DispatchError, req: &Request, res: &mut dyn ResponseSink) {
    if err.is_unauthorized() {
        res.status(401);
        res.end();
        return;
    }

    let status = err.status();
    if status >= 500 {
        logger::log_dispatch_failure(req, err);
        res.status(500);
    } else {
        res.status(status);
    }
    res.json(&json!({ "message": err.message() }));
}
