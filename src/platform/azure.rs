//! Azure Functions adapter
//!
//! Translates HTTP trigger requests and the response binding.

use std::collections::{BTreeMap, HashMap};

use hyper::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{run_event, EventAdapter};
use crate::dispatch::Dispatcher;
use crate::http::{lowercase_headers, parse_query, Body, Request, Response};

/// HTTP trigger request binding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AzureRequest {
    pub method: String,
    /// Absolute URL of the function invocation
    pub original_url: String,
    /// Route parameters; `pathname` carries the path when the route captures it
    pub params: HashMap<String, String>,
    pub query: Option<HashMap<String, String>>,
    pub headers: Option<HashMap<String, String>>,
    /// Body as already parsed by the Functions host
    pub body: Option<Value>,
    pub raw_body: Option<String>,
}

/// HTTP response binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Adapter for HTTP-triggered functions
#[derive(Debug, Clone, Copy, Default)]
pub struct Azure;

/// Split an absolute or relative URL into path and query
fn split_original_url(original_url: &str) -> (String, Option<String>) {
    match url::Url::parse(original_url) {
        Ok(parsed) => (parsed.path().to_string(), parsed.query().map(ToString::to_string)),
        Err(_) => match original_url.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (original_url.to_string(), None),
        },
    }
}

impl EventAdapter for Azure {
    type Event = AzureRequest;
    type Output = AzureResponse;

    fn to_request(&self, event: AzureRequest) -> Request {
        let method = Method::from_bytes(event.method.as_bytes()).unwrap_or(Method::GET);
        let (url_path, url_query) = split_original_url(&event.original_url);

        let path = event
            .params
            .get("pathname")
            .map(|pathname| pathname.split('?').next().unwrap_or_default().to_string())
            .unwrap_or_else(|| {
                urlencoding::decode(&url_path).map_or_else(|_| url_path.clone(), |p| p.into_owned())
            });
        let url = match &url_query {
            Some(q) => format!("{url_path}?{q}"),
            None => url_path.clone(),
        };

        let mut req = Request::new(method, url).with_path(path);
        req.query = event
            .query
            .unwrap_or_else(|| url_query.as_deref().map(parse_query).unwrap_or_default());
        req.headers = lowercase_headers(event.headers.unwrap_or_default());

        // a host-parsed body is re-read against the request content type
        match (event.raw_body, event.body) {
            (Some(raw), _) => req.set_raw_body(raw.as_bytes()),
            (None, Some(Value::String(text))) => req.set_raw_body(text.as_bytes()),
            (None, Some(value)) => req.set_raw_body(value.to_string().as_bytes()),
            (None, None) => req.body = Body::empty(),
        }
        req
    }

    fn to_output(&self, response: Response) -> AzureResponse {
        let is_json = response.is_json();
        let (status, headers, body) = response.into_parts();
        let body = if body.is_empty() {
            None
        } else if is_json {
            serde_json::from_slice(&body).ok()
        } else {
            Some(Value::String(String::from_utf8_lossy(&body).into_owned()))
        };
        AzureResponse {
            status,
            headers,
            body,
        }
    }
}

impl Azure {
    /// Dispatch one trigger request and return the response binding
    pub async fn handle(&self, dispatcher: &Dispatcher, event: AzureRequest) -> AzureResponse {
        run_event(self, dispatcher, event).await
    }

    /// Dispatch one trigger request and hand the response binding to `done`
    pub async fn invoke<F>(&self, dispatcher: &Dispatcher, event: AzureRequest, done: F)
    where
        F: FnOnce(AzureResponse),
    {
        done(self.handle(dispatcher, event).await);
    }
}
