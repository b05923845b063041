// Demonstration handler table served by the binary
// One table per invocation mode so either `dispatch.mode` setting has something to call

use chrono::{SecondsFormat, Utc};
use hyper::body::Bytes;
use serde_json::json;

use opdispatch::config::DispatchConfig;
use opdispatch::{
    arity, arity_range, to_reply, DispatchError, Dispatcher, Flow, Handler, Middleware, Mode,
    Operations, Options, ResponseSink, Route,
};

/// Build the dispatcher for the configured mode
pub fn dispatcher(config: &DispatchConfig) -> Dispatcher {
    let operations = match config.mode {
        Mode::Positional => positional_operations(),
        Mode::Direct => direct_operations(),
    };
    let options = Options::new()
        .with_mode(config.mode)
        .with_check_arity(config.check_arity)
        .with_middleware(vec![trace_request()]);
    Dispatcher::new(operations, options)
}

fn trace_request() -> Middleware {
    Middleware::request_fn(|req, _| {
        tracing::debug!(method = %req.method, url = %req.url, "incoming request");
        Ok(Flow::Continue)
    })
}

fn positional_operations() -> Operations {
    Operations::new()
        .register(
            "echo",
            Handler::positional_fn(0, |args, ctx| {
                to_reply(&json!({
                    "args": args,
                    "query": ctx.query,
                    "body": ctx.body.to_value(),
                }))
            }),
        )
        .register(
            "sum",
            Route::chain(
                vec![arity_range(1, None)],
                Handler::positional_fn(1, |args, _| {
                    let total = args.iter().try_fold(0_f64, |acc, arg| {
                        arg.parse::<f64>().map(|n| acc + n).map_err(|_| {
                            DispatchError::invalid_input(format!("Not a number: {arg:?}"))
                        })
                    })?;
                    to_reply(&total)
                }),
            ),
        )
        .register(
            "greet",
            Route::chain(
                vec![arity(1)],
                Handler::positional_fn(1, |args, _| {
                    // an empty name asks for nothing
                    let name = args.first().map(String::as_str).unwrap_or_default();
                    if name.is_empty() {
                        return Ok(None);
                    }
                    to_reply(&format!("Hello, {name}!"))
                }),
            ),
        )
        .register(
            "time",
            Handler::positional(0, |_, _| async {
                tokio::task::yield_now().await;
                to_reply(&Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            }),
        )
        .register(
            "lookup",
            Handler::positional_fn(1, |args, _| {
                // unknown keys answer null, which becomes a 404
                let value = match args.first().map(String::as_str) {
                    Some("version") => json!(env!("CARGO_PKG_VERSION")),
                    Some("name") => json!(env!("CARGO_PKG_NAME")),
                    _ => serde_json::Value::Null,
                };
                Ok(Some(value))
            }),
        )
}

fn direct_operations() -> Operations {
    Operations::new()
        .register(
            "echo",
            Handler::direct_fn(|req, res| {
                res.json(&json!({
                    "method": req.method.as_str(),
                    "params": req.params,
                    "query": req.query,
                    "body": req.body.to_value(),
                }));
                Ok(())
            }),
        )
        .register(
            "time",
            Route::chain(
                vec![arity(0)],
                Handler::direct_fn(|_, res| {
                    res.set_header("content-type", "text/plain; charset=utf-8");
                    res.send(Bytes::from(
                        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    ));
                    Ok(())
                }),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use opdispatch::{Request, Response};

    fn config(mode: Mode) -> DispatchConfig {
        DispatchConfig {
            mode,
            check_arity: true,
            platform: None,
        }
    }

    async fn get(dispatcher: &Dispatcher, url: &str) -> Response {
        let mut req = Request::new(Method::GET, url);
        let mut res = Response::new();
        dispatcher.handle(&mut req, &mut res).await;
        res
    }

    #[tokio::test]
    async fn test_positional_demo_table() {
        let dispatcher = dispatcher(&config(Mode::Positional));
        assert!(dispatcher.operations().validate(Mode::Positional).is_ok());

        assert_eq!(get(&dispatcher, "/sum/1/2.5").await.body_json(), Some(json!(3.5)));
        assert_eq!(get(&dispatcher, "/sum").await.status_code(), 400);
        assert_eq!(get(&dispatcher, "/sum/x").await.status_code(), 400);
        assert_eq!(get(&dispatcher, "/greet/ann").await.body_json(), Some(json!("Hello, ann!")));
        assert_eq!(get(&dispatcher, "/greet/").await.status_code(), 400);
        assert_eq!(get(&dispatcher, "/lookup/name").await.body_json(), Some(json!("opdispatch")));
        assert_eq!(get(&dispatcher, "/lookup/nothing").await.status_code(), 404);
        assert_eq!(get(&dispatcher, "/time").await.status_code(), 200);
    }

    #[tokio::test]
    async fn test_direct_demo_table() {
        let dispatcher = dispatcher(&config(Mode::Direct));
        assert!(dispatcher.operations().validate(Mode::Direct).is_ok());

        let res = get(&dispatcher, "/echo/a/b?c=d").await;
        assert_eq!(res.body_json().unwrap()["params"], json!(["a", "b"]));
        assert_eq!(get(&dispatcher, "/time/extra").await.status_code(), 400);
        assert!(get(&dispatcher, "/time").await.headers_sent());
    }
}
