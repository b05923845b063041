//! Argument-count guard middleware
//!
//! Opt-in stack entries that reject requests whose path carries the wrong
//! number of positional arguments. Usable in either invocation mode.

use super::error::DispatchError;
use super::middleware::{Flow, Middleware};
use super::path;

/// Require exactly `amount` arguments
pub fn arity(amount: usize) -> Middleware {
    Middleware::request_fn(move |req, _| {
        let found = path::arg_count(req.target_path());
        if found == amount {
            Ok(Flow::Continue)
        } else {
            Err(DispatchError::invalid_input(format!(
                "This operation requires exactly {amount} parameters. Received {found}."
            )))
        }
    })
}

/// Require between `min` and `max` arguments, `None` meaning no upper bound
pub fn arity_range(min: usize, max: Option<usize>) -> Middleware {
    Middleware::request_fn(move |req, _| {
        let found = path::arg_count(req.target_path());
        if found >= min && max.map_or(true, |max| found <= max) {
            return Ok(Flow::Continue);
        }
        let message = match max {
            Some(max) if max == min => {
                format!("This operation requires exactly {min} parameters. Received {found}.")
            }
            Some(max) => format!(
                "This operation requires between {min} and {max} parameters. Received {found}."
            ),
            None => format!("This operation requires at least {min} parameters. Received {found}."),
        };
        Err(DispatchError::invalid_input(message))
    })
}
