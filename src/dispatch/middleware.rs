//! Middleware stack runner
//!
//! Connect-style traversal: request middleware runs while no error is
//! active, error middleware runs only while one is. A step's outcome plays
//! the role of `next`: `Ok(Flow::Continue)` is `next()`, `Err(e)` is
//! `next(e)`, and a panic replaces the active error just like a thrown
//! exception. `Ok(Flow::Halt)` ends the stack because the step answered the
//! request itself.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::error::DispatchError;
use crate::http::{Request, ResponseSink};

/// What a middleware step wants to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The step produced the response; stop dispatching
    Halt,
}

pub type StepResult = Result<Flow, DispatchError>;

type RequestFn =
    dyn for<'a> Fn(&'a mut Request, &'a mut dyn ResponseSink) -> BoxFuture<'a, StepResult>
        + Send
        + Sync;

type ErrorFn = dyn for<'a> Fn(
        DispatchError,
        &'a mut Request,
        &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, StepResult>
    + Send
    + Sync;

/// A middleware step, tagged at registration as request- or error-handling
#[derive(Clone)]
pub enum Middleware {
    Request(Arc<RequestFn>),
    Error(Arc<ErrorFn>),
}

impl Middleware {
    /// Asynchronous request-handling middleware
    pub fn request<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut dyn ResponseSink) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Request(Arc::new(f))
    }

    /// Synchronous request-handling middleware
    pub fn request_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut dyn ResponseSink) -> StepResult + Send + Sync + 'static,
    {
        Self::request(move |req, res| {
            let outcome = f(req, res);
            Box::pin(std::future::ready(outcome))
        })
    }

    /// Asynchronous error-handling middleware
    pub fn error<F>(f: F) -> Self
    where
        F: for<'a> Fn(
                DispatchError,
                &'a mut Request,
                &'a mut dyn ResponseSink,
            ) -> BoxFuture<'a, StepResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Error(Arc::new(f))
    }

    /// Synchronous error-handling middleware
    pub fn error_fn<F>(f: F) -> Self
    where
        F: Fn(DispatchError, &mut Request, &mut dyn ResponseSink) -> StepResult
            + Send
            + Sync
            + 'static,
    {
        Self::error(move |err, req, res| {
            let outcome = f(err, req, res);
            Box::pin(std::future::ready(outcome))
        })
    }

    pub const fn is_error_handler(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(_) => f.write_str("Middleware::Request"),
            Self::Error(_) => f.write_str("Middleware::Error"),
        }
    }
}

/// Run a stack against one request
///
/// Every step is visited in order. Steps whose kind does not match the
/// current error state are skipped. Completion is deferred by one
/// scheduler turn so the caller's own frames unwind before it continues.
pub async fn run_stack(
    stack: &[Middleware],
    req: &mut Request,
    res: &mut dyn ResponseSink,
) -> StepResult {
    let mut error: Option<DispatchError> = None;

    for step in stack {
        let outcome = match (step, error.take()) {
            (Middleware::Error(handle), Some(err)) => {
                AssertUnwindSafe(async { handle(err, &mut *req, &mut *res).await })
                    .catch_unwind()
                    .await
            }
            (Middleware::Request(handle), None) => {
                AssertUnwindSafe(async { handle(&mut *req, &mut *res).await })
                    .catch_unwind()
                    .await
            }
            (_, pending) => {
                error = pending;
                continue;
            }
        };

        match outcome.unwrap_or_else(|payload| Err(DispatchError::panicked(payload.as_ref()))) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Halt) => {
                tokio::task::yield_now().await;
                return Ok(Flow::Halt);
            }
            Err(e) => error = Some(e),
        }
    }

    tokio::task::yield_now().await;
    error.map_or(Ok(Flow::Continue), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use hyper::Method;
    use std::cell::Cell;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    fn record(trace: &Trace, label: &'static str) -> Middleware {
        let trace = Arc::clone(trace);
        Middleware::request_fn(move |_, _| {
            trace.lock().unwrap().push(label);
            Ok(Flow::Continue)
        })
    }

    fn recover(trace: &Trace, label: &'static str) -> Middleware {
        let trace = Arc::clone(trace);
        Middleware::error_fn(move |_, _, _| {
            trace.lock().unwrap().push(label);
            Ok(Flow::Continue)
        })
    }

    fn thrower() -> Middleware {
        Middleware::request_fn(|_, _| panic!("mw error"))
    }

    async fn run(stack: &[Middleware]) -> StepResult {
        let mut req = Request::new(Method::GET, "/test");
        let mut res = Response::new();
        run_stack(stack, &mut req, &mut res).await
    }

    #[tokio::test]
    async fn test_runs_all_request_middleware() {
        let trace = Trace::default();
        let stack = vec![record(&trace, "a"), record(&trace, "b"), record(&trace, "c")];
        assert_eq!(run(&stack).await.unwrap(), Flow::Continue);
        assert_eq!(*trace.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_error_skips_request_middleware_until_recovered() {
        let trace = Trace::default();
        let stack = vec![
            record(&trace, "A"),
            thrower(),
            record(&trace, "C"),
            recover(&trace, "D"),
            record(&trace, "E"),
        ];
        assert_eq!(run(&stack).await.unwrap(), Flow::Continue);
        assert_eq!(*trace.lock().unwrap(), vec!["A", "D", "E"]);
    }

    #[tokio::test]
    async fn test_unrecovered_error_reaches_callback() {
        let trace = Trace::default();
        let stack = vec![record(&trace, "a"), thrower(), record(&trace, "b")];
        let err = run(&stack).await.unwrap_err();
        assert_eq!(err.message(), "mw error");
        assert_eq!(*trace.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_returned_error_behaves_like_next_err() {
        let trace = Trace::default();
        let stack = vec![
            record(&trace, "a"),
            Middleware::request_fn(|_, _| Err(DispatchError::with_status(418, "teapot"))),
            record(&trace, "b"),
        ];
        let err = run(&stack).await.unwrap_err();
        assert_eq!(err.status(), 418);
        assert_eq!(*trace.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_error_middleware_skipped_without_error() {
        let trace = Trace::default();
        let stack = vec![recover(&trace, "err"), record(&trace, "ok")];
        assert!(run(&stack).await.is_ok());
        assert_eq!(*trace.lock().unwrap(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_error_middleware_can_forward() {
        let stack = vec![
            thrower(),
            Middleware::error_fn(|err, _, _| Err(err.status_override(409))),
        ];
        assert_eq!(run(&stack).await.unwrap_err().status(), 409);
    }

    #[tokio::test]
    async fn test_panicking_error_middleware_replaces_error() {
        let stack = vec![
            thrower(),
            Middleware::error_fn(|_, _, _| panic!("second failure")),
        ];
        assert_eq!(run(&stack).await.unwrap_err().message(), "second failure");
    }

    #[tokio::test]
    async fn test_halt_stops_the_stack() {
        let trace = Trace::default();
        let stack = vec![
            Middleware::request_fn(|_, res| {
                res.status(304);
                res.end();
                Ok(Flow::Halt)
            }),
            record(&trace, "after"),
        ];
        assert_eq!(run(&stack).await.unwrap(), Flow::Halt);
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_async_middleware_mutates_request() {
        let stack = vec![Middleware::request(|req, _| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                req.user = Some(serde_json::json!({ "username": "joe" }));
                Ok::<_, DispatchError>(Flow::Continue)
            })
        })];
        let mut req = Request::new(Method::GET, "/test");
        let mut res = Response::new();
        run_stack(&stack, &mut req, &mut res).await.unwrap();
        assert_eq!(req.user, Some(serde_json::json!({ "username": "joe" })));
    }

    #[tokio::test]
    async fn test_empty_stack_continues() {
        assert_eq!(run(&[]).await.unwrap(), Flow::Continue);
    }

    /// Run the stack next to a sibling future that flags its first poll
    async fn run_beside_sibling(stack: &[Middleware]) -> StepResult {
        let sibling_ran = Cell::new(false);
        let (outcome, ()) = tokio::join!(
            async {
                let outcome = run(stack).await;
                assert!(sibling_ran.get(), "stack completed before yielding");
                outcome
            },
            async { sibling_ran.set(true) },
        );
        outcome
    }

    #[tokio::test]
    async fn test_completion_waits_one_scheduler_turn() {
        let trace = Trace::default();
        assert_eq!(run_beside_sibling(&[]).await.unwrap(), Flow::Continue);

        let sync_only = vec![record(&trace, "a"), record(&trace, "b")];
        assert_eq!(run_beside_sibling(&sync_only).await.unwrap(), Flow::Continue);

        let halting = vec![Middleware::request_fn(|_, _| Ok(Flow::Halt))];
        assert_eq!(run_beside_sibling(&halting).await.unwrap(), Flow::Halt);

        let failing = vec![Middleware::request_fn(|_, _| Err(DispatchError::invalid_input("bad")))];
        assert_eq!(run_beside_sibling(&failing).await.unwrap_err().status(), 400);
    }

    #[test]
    fn test_steps_are_tagged_at_registration() {
        let trace = Trace::default();
        assert!(!record(&trace, "a").is_error_handler());
        assert!(recover(&trace, "b").is_error_handler());
    }
}
