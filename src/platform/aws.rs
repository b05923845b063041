//! AWS Lambda adapter
//!
//! Translates API Gateway proxy integration events and responses.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hyper::Method;
use serde::{Deserialize, Serialize};

use super::{run_event, EventAdapter};
use crate::dispatch::Dispatcher;
use crate::http::{lowercase_headers, Body, Request, Response};

/// API Gateway proxy event; unknown fields are ignored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyEvent {
    pub http_method: String,
    pub path: String,
    /// Absent when the client sent no headers
    pub headers: Option<HashMap<String, String>>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}

/// API Gateway proxy response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

/// Adapter for API Gateway proxy events
#[derive(Debug, Clone, Copy, Default)]
pub struct Aws;

impl EventAdapter for Aws {
    type Event = ProxyEvent;
    type Output = ProxyResponse;

    fn to_request(&self, event: ProxyEvent) -> Request {
        let method = Method::from_bytes(event.http_method.as_bytes()).unwrap_or(Method::GET);
        let query = event.query_string_parameters.unwrap_or_default();
        let url = if query.is_empty() {
            event.path.clone()
        } else {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter())
                .finish();
            format!("{}?{encoded}", event.path)
        };

        let mut req = Request::new(method, url).with_path(event.path);
        req.query = query;
        req.headers = lowercase_headers(event.headers.unwrap_or_default());

        let raw = event.body.unwrap_or_default();
        if event.is_base64_encoded {
            match STANDARD.decode(raw.as_bytes()) {
                Ok(bytes) => req.set_raw_body(&bytes),
                Err(e) => {
                    tracing::warn!("body flagged as base64 but failed to decode: {e}");
                    req.body = Body::Text(raw);
                }
            }
        } else {
            req.set_raw_body(raw.as_bytes());
        }
        req
    }

    fn to_output(&self, response: Response) -> ProxyResponse {
        let (status_code, headers, body) = response.into_parts();
        match String::from_utf8(body.to_vec()) {
            Ok(body) => ProxyResponse {
                status_code,
                headers,
                body,
                is_base64_encoded: false,
            },
            Err(_) => ProxyResponse {
                status_code,
                headers,
                body: STANDARD.encode(&body),
                is_base64_encoded: true,
            },
        }
    }
}

impl Aws {
    /// Dispatch one event and return the proxy response
    pub async fn handle(&self, dispatcher: &Dispatcher, event: ProxyEvent) -> ProxyResponse {
        run_event(self, dispatcher, event).await
    }

    /// Dispatch one event and deliver the proxy response to `done`
    pub async fn invoke<F>(&self, dispatcher: &Dispatcher, event: ProxyEvent, done: F)
    where
        F: FnOnce(ProxyResponse),
    {
        done(self.handle(dispatcher, event).await);
    }
}
