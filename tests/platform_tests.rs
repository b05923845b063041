//! Platform adapter tests
//!
//! Event documents are written the way each platform delivers them, so
//! these double as wire-format checks for the adapters.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use serde_json::{json, Value};

use opdispatch::platform::{self, service, Aws, Azure, Platform, ProxyResponse};
use opdispatch::{to_reply, DispatchError, Dispatcher, Handler, Operations, Options, ResponseSink};

fn dispatcher() -> Dispatcher {
    let operations = Operations::new()
        .register(
            "echo",
            Handler::positional_fn(0, |args, ctx| {
                to_reply(&json!({
                    "args": args,
                    "query": ctx.query,
                    "body": ctx.body.to_value(),
                    "agent": ctx.headers.get("user-agent"),
                }))
            }),
        )
        .register("missing", Handler::positional_fn(0, |_, _| Ok(Some(Value::Null))))
        .register(
            "secret",
            Handler::positional_fn(0, |_, _| Err(DispatchError::unauthorized("no token"))),
        );
    Dispatcher::new(operations, Options::default())
}

#[tokio::test]
async fn test_hyper_service_round_trip() {
    let dispatcher = dispatcher();
    let req = hyper::Request::builder()
        .method("PUT")
        .uri("/echo/a%20b/c?x=1")
        .header("Content-Type", "application/json")
        .header("User-Agent", "curl/8.0")
        .body(Full::new(Bytes::from_static(br#"{"n":2}"#)))
        .unwrap();

    let res = service::serve(&dispatcher, req, 1024).await;
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "application/json; charset=utf-8"
    );
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!({ "args": ["a b", "c"], "query": { "x": "1" }, "body": { "n": 2 }, "agent": "curl/8.0" })
    );
}

#[tokio::test]
async fn test_hyper_service_body_limit() {
    let dispatcher = dispatcher();
    let req = hyper::Request::builder()
        .method("POST")
        .uri("/echo")
        .body(Full::new(Bytes::from(vec![b'x'; 64])))
        .unwrap();
    let res = service::serve(&dispatcher, req, 16).await;
    assert_eq!(res.status(), 413);
}

#[tokio::test]
async fn test_aws_event_round_trip() {
    let dispatcher = dispatcher();
    let event = serde_json::from_value(json!({
        "resource": "/{proxy+}",
        "path": "/echo/jdoe/1967",
        "httpMethod": "POST",
        "headers": { "Content-Type": "application/json", "User-Agent": "Custom User Agent String" },
        "queryStringParameters": { "a": "1" },
        "requestContext": { "stage": "prod" },
        "body": "{\"name\":\"jdoe\"}",
        "isBase64Encoded": false
    }))
    .unwrap();

    let out = Aws.handle(&dispatcher, event).await;
    assert_eq!(out.status_code, 200);
    assert!(!out.is_base64_encoded);
    assert_eq!(
        serde_json::from_str::<Value>(&out.body).unwrap(),
        json!({
            "args": ["jdoe", "1967"],
            "query": { "a": "1" },
            "body": { "name": "jdoe" },
            "agent": "Custom User Agent String"
        })
    );
}

#[tokio::test]
async fn test_aws_event_without_headers() {
    let dispatcher = dispatcher();
    let event = serde_json::from_value(json!({
        "path": "/echo",
        "httpMethod": "POST",
        "headers": null,
        "queryStringParameters": null,
        "body": "plain words"
    }))
    .unwrap();

    let out = Aws.handle(&dispatcher, event).await;
    let body: Value = serde_json::from_str(&out.body).unwrap();
    assert_eq!(body["body"], json!("plain words"));
    assert_eq!(body["query"], json!({}));
    assert_eq!(body["agent"], Value::Null);
}

#[tokio::test]
async fn test_aws_base64_body() {
    let dispatcher = dispatcher();
    let event = serde_json::from_value(json!({
        "path": "/echo",
        "httpMethod": "POST",
        "headers": { "content-type": "application/json" },
        "body": STANDARD.encode(br#"[1,2]"#),
        "isBase64Encoded": true
    }))
    .unwrap();

    let out = Aws.handle(&dispatcher, event).await;
    let body: Value = serde_json::from_str(&out.body).unwrap();
    assert_eq!(body["body"], json!([1, 2]));
}

#[tokio::test]
async fn test_aws_invoke_delivers_errors_as_responses() {
    let dispatcher = dispatcher();
    let mut delivered: Option<ProxyResponse> = None;
    let event = serde_json::from_value(json!({ "path": "/secret", "httpMethod": "GET" })).unwrap();
    Aws.invoke(&dispatcher, event, |res| delivered = Some(res)).await;

    let res = delivered.unwrap();
    assert_eq!(res.status_code, 401);
    assert_eq!(res.body, "");

    let event = serde_json::from_value(json!({ "path": "/missing", "httpMethod": "GET" })).unwrap();
    let res = Aws.handle(&dispatcher, event).await;
    assert_eq!(res.status_code, 404);
    assert_eq!(
        serde_json::from_str::<Value>(&res.body).unwrap(),
        json!({ "message": "Operation returned no result" })
    );
}

#[tokio::test]
async fn test_azure_context_round_trip() {
    let dispatcher = dispatcher();
    let event = serde_json::from_value(json!({
        "method": "PATCH",
        "originalUrl": "https://test-function-url/echo/jdoe?a=1",
        "headers": { "Content-Type": "application/json", "host": "test-function-url" },
        "query": { "a": "1" },
        "params": { "pathname": "/echo/jdoe" },
        "body": { "name": "jdoe" },
        "rawBody": "{\"name\":\"jdoe\"}"
    }))
    .unwrap();

    let mut status = 0;
    Azure
        .invoke(&dispatcher, event, |res| {
            status = res.status;
            assert_eq!(
                res.body,
                Some(json!({ "args": ["jdoe"], "query": { "a": "1" }, "body": { "name": "jdoe" }, "agent": null }))
            );
        })
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_event_bodies_stay_raw_unless_json() {
    let dispatcher = dispatcher();
    let cases = [
        ("text/plain", json!({ "a": 1 }), json!(r#"{"a":1}"#)),
        ("application/json", json!("{\"a\":"), json!(r#"{"a":"#)),
        ("application/json", json!({ "a": 1 }), json!({ "a": 1 })),
    ];

    for (content_type, body, expected) in cases {
        let raw = match &body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        let event = serde_json::from_value(json!({
            "path": "/echo",
            "httpMethod": "POST",
            "headers": { "Content-Type": content_type },
            "body": raw
        }))
        .unwrap();
        let out = Aws.handle(&dispatcher, event).await;
        let echoed: Value = serde_json::from_str(&out.body).unwrap();
        assert_eq!(echoed["body"], expected, "aws {content_type}");

        // host-parsed body only, no rawBody
        let event = serde_json::from_value(json!({
            "method": "POST",
            "originalUrl": "https://test-function-url/echo",
            "headers": { "Content-Type": content_type },
            "body": body
        }))
        .unwrap();
        let out = Azure.handle(&dispatcher, event).await;
        assert_eq!(out.body.unwrap()["body"], expected, "azure {content_type}");
    }
}

#[tokio::test]
async fn test_run_json_event() {
    let dispatcher = dispatcher();

    let output = platform::run_json_event(
        Platform::Aws,
        &dispatcher,
        r#"{"path":"/echo/x","httpMethod":"GET"}"#,
    )
    .await
    .unwrap();
    let output: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(output["statusCode"], json!(200));
    assert_eq!(output["isBase64Encoded"], json!(false));

    let output = platform::run_json_event(
        Platform::Azure,
        &dispatcher,
        r#"{"method":"GET","originalUrl":"https://host/nope"}"#,
    )
    .await
    .unwrap();
    let output: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(output["status"], json!(404));

    assert!(platform::run_json_event(Platform::Aws, &dispatcher, "not json").await.is_err());
    assert!(platform::run_json_event(Platform::Http, &dispatcher, "{}").await.is_err());
}

#[test]
fn test_platform_detection() {
    let env = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    };

    assert_eq!(platform::detect(&env(&[])), Platform::Http);
    assert_eq!(platform::detect(&env(&[("K_SERVICE", "fn")])), Platform::GoogleCloud);
    assert_eq!(platform::detect(&env(&[("FUNCTIONS_WORKER_RUNTIME", "node")])), Platform::Azure);
    assert_eq!(
        platform::detect(&env(&[("FUNCTION_NAME", "fn"), ("AWS_LAMBDA_FUNCTION_NAME", "fn")])),
        Platform::Aws
    );
    assert_eq!(platform::detect(&env(&[("K_SERVICE", "")])), Platform::Http);
}

#[test]
fn test_platform_names() {
    assert_eq!("aws".parse::<Platform>().unwrap(), Platform::Aws);
    assert_eq!("GCloud".parse::<Platform>().unwrap(), Platform::GoogleCloud);
    assert_eq!("express".parse::<Platform>().unwrap(), Platform::Http);

    let err = "heroku".parse::<Platform>().unwrap_err();
    assert!(err.to_string().contains("heroku"));
}

#[test]
fn test_response_sink_is_write_once() {
    let mut res = opdispatch::Response::new();
    res.json(&json!({ "first": true }));
    res.status(500);
    res.json(&json!({ "second": true }));
    assert!(res.headers_sent());
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.body_json(), Some(json!({ "first": true })));
}
