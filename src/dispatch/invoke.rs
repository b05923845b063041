//! Handler invocation
//!
//! Two conventions are supported. Direct handlers receive the request and
//! response sink and write the response themselves. Positional handlers
//! receive the path arguments plus a [`CallContext`] and return a value the
//! invoker turns into a response.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{DispatchError, ErrorKind};
use crate::http::{CallContext, Request, ResponseSink};

/// Value returned by a positional handler
///
/// `None` means "nothing to say" (204), `Some(Value::Null)` means "not
/// found" (404), anything else is sent as JSON with status 200.
pub type Reply = Option<Value>;

pub type HandlerResult = Result<Reply, DispatchError>;

/// Invocation convention used by a dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Handlers get the request and response sink
    #[serde(alias = "reqres", alias = "http")]
    Direct,
    /// Handlers get positional arguments and return a value
    #[default]
    #[serde(alias = "function")]
    Positional,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Positional => f.write_str("positional"),
        }
    }
}

type DirectFn = dyn for<'a> Fn(
        &'a mut Request,
        &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, Result<(), DispatchError>>
    + Send
    + Sync;

type PositionalFn = dyn Fn(Vec<String>, CallContext) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// User-supplied operation handler
#[derive(Clone)]
pub enum Handler {
    Direct(Arc<DirectFn>),
    Positional {
        /// Declared number of required positional parameters
        required: usize,
        call: Arc<PositionalFn>,
    },
}

impl Handler {
    pub fn direct<F>(f: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut Request,
                &'a mut dyn ResponseSink,
            ) -> BoxFuture<'a, Result<(), DispatchError>>
            + Send
            + Sync
            + 'static,
    {
        Self::Direct(Arc::new(f))
    }

    pub fn direct_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut dyn ResponseSink) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    {
        Self::direct(move |req, res| {
            let outcome = f(req, res);
            Box::pin(std::future::ready(outcome))
        })
    }

    /// Asynchronous positional handler declaring `required` parameters
    pub fn positional<F, Fut>(required: usize, f: F) -> Self
    where
        F: Fn(Vec<String>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let call = move |args: Vec<String>, ctx: CallContext| -> BoxFuture<'static, HandlerResult> {
            Box::pin(f(args, ctx))
        };
        Self::Positional {
            required,
            call: Arc::new(call),
        }
    }

    pub fn positional_fn<F>(required: usize, f: F) -> Self
    where
        F: Fn(Vec<String>, CallContext) -> HandlerResult + Send + Sync + 'static,
    {
        Self::positional(required, move |args, ctx| std::future::ready(f(args, ctx)))
    }

    pub const fn mode(&self) -> Mode {
        match self {
            Self::Direct(_) => Mode::Direct,
            Self::Positional { .. } => Mode::Positional,
        }
    }

    pub const fn required_args(&self) -> usize {
        match self {
            Self::Direct(_) => 0,
            Self::Positional { required, .. } => *required,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Handler::Direct"),
            Self::Positional { required, .. } => f
                .debug_struct("Handler::Positional")
                .field("required", required)
                .finish_non_exhaustive(),
        }
    }
}

/// Call a resolved handler and settle its outcome
///
/// Errors (returned or panicked) are handed back to the caller; they are
/// never written to the response here.
pub async fn invoke(
    handler: &Handler,
    check_arity: bool,
    args: Vec<String>,
    req: &mut Request,
    res: &mut dyn ResponseSink,
) -> Result<(), DispatchError> {
    match handler {
        Handler::Direct(call) => {
            req.params = args;
            AssertUnwindSafe(async { call(&mut *req, &mut *res).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(DispatchError::panicked(payload.as_ref())))
        }
        Handler::Positional { required, call } => {
            if check_arity && args.len() < *required {
                return Err(DispatchError::invalid_input(format!(
                    "This operation requires {required} parameters. Received {}.",
                    args.len()
                )));
            }
            let ctx = CallContext::from(&*req);
            let reply = AssertUnwindSafe(async { call(args, ctx).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(DispatchError::panicked(payload.as_ref())))?;
            write_reply(reply, res)
        }
    }
}

/// Turn a positional handler's value into a response
fn write_reply(reply: Reply, res: &mut dyn ResponseSink) -> Result<(), DispatchError> {
    if res.headers_sent() {
        tracing::debug!("handler response already sent, skipping automatic reply");
        return Ok(());
    }
    match reply {
        Some(Value::Null) => Err(DispatchError::new(
            ErrorKind::NullResponse,
            "Operation returned no result",
        )),
        None => {
            res.status(204);
            res.end();
            Ok(())
        }
        Some(Value::String(s)) if s.is_empty() => {
            res.status(204);
            res.end();
            Ok(())
        }
        Some(value) => {
            res.status(200);
            res.json(&value);
            Ok(())
        }
    }
}

/// Serialise any value into a positional reply
pub fn to_reply<T: Serialize>(value: &T) -> HandlerResult {
    Ok(Some(serde_json::to_value(value)?))
}
