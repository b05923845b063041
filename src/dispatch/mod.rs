//! Operation dispatch
//!
//! A [`Dispatcher`] maps the first path segment of a request to one entry of
//! a fixed handler table. Each request runs the global middleware stack,
//! resolves the operation, runs the operation's own middleware and finally
//! invokes its handler. Every failure along the way ends up either in the
//! configured error handler or in the caller's continuation.

pub mod arity;
pub mod error;
pub mod invoke;
pub mod middleware;
pub mod path;
pub mod table;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub use arity::{arity, arity_range};
pub use error::{default_error_handler, DispatchError, ErrorHandler, ErrorKind, UNAUTHORIZED_NAME};
pub use invoke::{invoke, to_reply, Handler, HandlerResult, Mode, Reply};
pub use middleware::{run_stack, Flow, Middleware, StepResult};
pub use path::{parse, parse_url, ParsedPath};
pub use table::{Operations, Resolved, Route, Step};

use crate::http::{Request, ResponseSink};

/// Completion callback supplied by an outer framework
///
/// Receives `None` on success or the error the dispatch ended with.
pub type Continuation = Box<dyn FnOnce(Option<DispatchError>) + Send>;

/// Dispatcher configuration
#[derive(Clone)]
pub struct Options {
    pub mode: Mode,
    /// Global stack, run for every request before the operation is resolved
    pub middleware: Vec<Middleware>,
    /// Reject positional calls with fewer arguments than the handler requires
    pub check_arity: bool,
    /// Replaces [`default_error_handler`] when set
    pub error_handler: Option<ErrorHandler>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, middleware: Vec<Middleware>) -> Self {
        self.middleware = middleware;
        self
    }

    #[must_use]
    pub const fn with_check_arity(mut self, check_arity: bool) -> Self {
        self.check_arity = check_arity;
        self
    }

    #[must_use]
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&DispatchError, &Request, &mut dyn ResponseSink) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: Mode::Positional,
            middleware: Vec::new(),
            check_arity: true,
            error_handler: None,
        }
    }
}

/// A bare middleware list stands in for the whole options value
impl From<Vec<Middleware>> for Options {
    fn from(middleware: Vec<Middleware>) -> Self {
        Self::default().with_middleware(middleware)
    }
}

impl From<Mode> for Options {
    fn from(mode: Mode) -> Self {
        Self::default().with_mode(mode)
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("mode", &self.mode)
            .field("middleware", &self.middleware.len())
            .field("check_arity", &self.check_arity)
            .field("custom_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

struct Inner {
    operations: Operations,
    options: Options,
}

/// Request entry point shared by every platform adapter
///
/// Cheap to clone; the handler table and options are immutable once built.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(operations: Operations, options: impl Into<Options>) -> Self {
        let options = options.into();
        tracing::debug!(
            operations = operations.len(),
            mode = %options.mode,
            global_middleware = options.middleware.len(),
            "dispatcher created"
        );
        Self {
            inner: Arc::new(Inner {
                operations,
                options,
            }),
        }
    }

    pub fn operations(&self) -> &Operations {
        &self.inner.operations
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn mode(&self) -> Mode {
        self.inner.options.mode
    }

    /// Run the full pipeline and hand back its outcome
    ///
    /// Nothing is written on failure; the caller decides how to report it.
    pub async fn try_handle(
        &self,
        req: &mut Request,
        res: &mut dyn ResponseSink,
    ) -> Result<(), DispatchError> {
        let options = &self.inner.options;

        // global middleware always settles before the operation is looked up
        if run_stack(&options.middleware, req, res).await? == Flow::Halt {
            return Ok(());
        }

        let ParsedPath { operation, args } = path::parse(req.target_path());
        let resolved = self.inner.operations.resolve(&operation, options.mode)?;
        tracing::debug!(%operation, args = args.len(), "dispatching operation");

        req.params.clone_from(&args);
        if run_stack(&resolved.middleware, req, res).await? == Flow::Halt {
            return Ok(());
        }

        invoke(&resolved.handler, options.check_arity, args, req, res).await
    }

    /// Dispatch with an optional continuation
    ///
    /// With a continuation, it is called exactly once with the outcome and the
    /// error handler is bypassed. Without one, failures go to the error handler.
    pub async fn call(
        &self,
        req: &mut Request,
        res: &mut dyn ResponseSink,
        next: Option<Continuation>,
    ) {
        let outcome = self.try_handle(req, res).await;
        match next {
            Some(next) => next(outcome.err()),
            None => {
                if let Err(err) = outcome {
                    self.report_error(&err, req, res);
                }
            }
        }
    }

    pub async fn handle(&self, req: &mut Request, res: &mut dyn ResponseSink) {
        self.call(req, res, None).await;
    }

    /// Translate an error into a response with the configured error handler
    ///
    /// A panicking custom handler falls back to the default one.
    pub fn report_error(&self, err: &DispatchError, req: &Request, res: &mut dyn ResponseSink) {
        let Some(handler) = &self.inner.options.error_handler else {
            default_error_handler(err, req, res);
            return;
        };
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(err, req, &mut *res)));
        if let Err(payload) = outcome {
            let panic = DispatchError::panicked(payload.as_ref());
            crate::logger::log_error(&format!("error handler panicked: {}", panic.message()));
            default_error_handler(err, req, res);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.inner.operations.len())
            .field("options", &self.inner.options)
            .finish()
    }
}
