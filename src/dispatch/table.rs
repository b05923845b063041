//! Handler table and operation resolution
//!
//! The table is built once before serving and only read afterwards. Entries
//! are either a bare handler or a chain of middleware ending in a handler.
//! Malformed chains are accepted at registration and reported per request as
//! `InvalidConfig`; [`Operations::validate`] checks them eagerly.

use std::collections::HashMap;

use super::error::{DispatchError, ErrorKind};
use super::invoke::{Handler, Mode};
use super::middleware::Middleware;

/// One element of a handler table entry
#[derive(Debug, Clone)]
pub enum Step {
    Middleware(Middleware),
    Handler(Handler),
}

impl From<Middleware> for Step {
    fn from(mw: Middleware) -> Self {
        Self::Middleware(mw)
    }
}

impl From<Handler> for Step {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

/// Handler table entry: leading middleware steps and a terminal handler
#[derive(Debug, Clone, Default)]
pub struct Route {
    steps: Vec<Step>,
}

impl Route {
    /// Entry made of arbitrary steps, validated only when resolved
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Well-formed chain: `middleware...` followed by `handler`
    pub fn chain(middleware: Vec<Middleware>, handler: Handler) -> Self {
        let mut steps: Vec<Step> = middleware.into_iter().map(Step::Middleware).collect();
        steps.push(Step::Handler(handler));
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Split the entry into its middleware prefix and terminal handler
    fn split(&self, operation: &str) -> Result<(Vec<Middleware>, &Handler), DispatchError> {
        let Some((last, prefix)) = self.steps.split_last() else {
            return Err(invalid_config(operation, "handler chain is empty"));
        };
        let Step::Handler(handler) = last else {
            return Err(invalid_config(operation, "last element must be a handler"));
        };
        let middleware = prefix
            .iter()
            .map(|step| match step {
                Step::Middleware(mw) => Ok(mw.clone()),
                Step::Handler(_) => Err(invalid_config(
                    operation,
                    "only the last element may be a handler",
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((middleware, handler))
    }
}

impl From<Handler> for Route {
    fn from(handler: Handler) -> Self {
        Self {
            steps: vec![Step::Handler(handler)],
        }
    }
}

impl From<Vec<Step>> for Route {
    fn from(steps: Vec<Step>) -> Self {
        Self::from_steps(steps)
    }
}

/// Outcome of a successful lookup
#[derive(Debug, Clone)]
pub struct Resolved {
    pub middleware: Vec<Middleware>,
    pub handler: Handler,
}

/// Handler table keyed by case-sensitive operation name
#[derive(Debug, Clone, Default)]
pub struct Operations {
    routes: HashMap<String, Route>,
}

impl Operations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an operation
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, route: impl Into<Route>) -> Self {
        self.insert(name, route);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, route: impl Into<Route>) {
        let name = name.into();
        if name.is_empty() {
            tracing::warn!("registered an operation with an empty name; it can never be reached");
        }
        self.routes.insert(name, route.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Look up an operation and check it can be invoked under `mode`
    pub fn resolve(&self, operation: &str, mode: Mode) -> Result<Resolved, DispatchError> {
        if operation.is_empty() {
            return Err(DispatchError::new(
                ErrorKind::NoOperation,
                "Operation must be specified!",
            ));
        }
        let route = self.routes.get(operation).ok_or_else(|| {
            DispatchError::new(ErrorKind::NotFound, format!("No handler for: {operation}"))
        })?;

        let (middleware, handler) = route.split(operation)?;
        if handler.mode() != mode {
            return Err(invalid_config(
                operation,
                &format!("{} handler cannot run in {mode} mode", handler.mode()),
            ));
        }
        Ok(Resolved {
            middleware,
            handler: handler.clone(),
        })
    }

    /// Check every entry up front, reporting the first malformed one
    pub fn validate(&self, mode: Mode) -> Result<(), DispatchError> {
        let mut names: Vec<&String> = self.routes.keys().collect();
        names.sort();
        for name in names {
            if name.is_empty() {
                continue;
            }
            self.resolve(name, mode)?;
        }
        Ok(())
    }
}

impl<S: Into<String>, R: Into<Route>> FromIterator<(S, R)> for Operations {
    fn from_iter<I: IntoIterator<Item = (S, R)>>(iter: I) -> Self {
        let mut ops = Self::new();
        for (name, route) in iter {
            ops.insert(name, route);
        }
        ops
    }
}

fn invalid_config(operation: &str, detail: &str) -> DispatchError {
    DispatchError::new(
        ErrorKind::InvalidConfig,
        format!("Handler must be a function or array ({operation}: {detail})"),
    )
}
