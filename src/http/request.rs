//! Request context module
//!
//! The single request shape every platform adapter produces: method, path,
//! query map, lower-cased headers, normalised body and the authenticated user.

use std::collections::HashMap;

use hyper::http::Extensions;
use hyper::Method;
use serde_json::{Map, Value};

/// Request body after adapter normalisation
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Parsed JSON document (an empty body normalises to `{}`)
    Json(Value),
    /// Raw text when the content type is not JSON or parsing failed
    Text(String),
}

impl Body {
    /// Normalise a raw body string using the request content type
    ///
    /// Empty bodies become an empty object. JSON content types are parsed,
    /// falling back to the raw string when the document is malformed.
    pub fn normalize(content_type: Option<&str>, raw: &str) -> Self {
        if raw.is_empty() {
            return Self::empty();
        }
        if content_type.is_some_and(is_json_content_type) {
            if let Ok(value) = serde_json::from_str(raw) {
                return Self::Json(value);
            }
        }
        Self::Text(raw.to_string())
    }

    pub fn empty() -> Self {
        Self::Json(Value::Object(Map::new()))
    }

    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    /// Body as a JSON value, raw text becoming a JSON string
    pub fn to_value(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

/// Check whether a content type denotes JSON (`application/json`, `+json` suffixes)
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Per-dispatch request context
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Full request target, possibly including a query string
    pub url: String,
    /// Decoded path when the adapter already split it from the URL
    pub path: Option<String>,
    pub query: HashMap<String, String>,
    /// Header names are always lower-case
    pub headers: HashMap<String, String>,
    pub body: Body,
    /// Identity attached by authentication middleware
    pub user: Option<Value>,
    /// Positional arguments parsed from the path
    pub params: Vec<String>,
    /// Typed values middleware wants to hand to later steps
    pub extensions: Extensions,
}

impl Request {
    /// Build a request from a method and a URL, parsing the query string
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        let query = url
            .split_once('?')
            .map(|(_, q)| parse_query(q))
            .unwrap_or_default();
        Self {
            method,
            url,
            path: None,
            query,
            headers: HashMap::new(),
            body: Body::empty(),
            user: None,
            params: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Path to dispatch on: the adapter's path, or the URL without its query
    pub fn target_path(&self) -> &str {
        self.path
            .as_deref()
            .unwrap_or_else(|| self.url.split('?').next().unwrap_or_default())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Normalise raw body bytes against the current content type
    pub fn set_raw_body(&mut self, raw: &[u8]) {
        let raw = String::from_utf8_lossy(raw);
        self.body = Body::normalize(self.content_type(), &raw);
    }
}

/// Parse a query string into a map; later duplicates win
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Lower-case header names, keeping the last value for duplicate names
pub fn lowercase_headers<I, K, V>(headers: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    headers
        .into_iter()
        .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
        .collect()
}

/// Request data exposed to positional handlers after their arguments
#[derive(Debug, Clone)]
pub struct CallContext {
    pub method: Method,
    pub headers: HashMap<String, String>,
    pub body: Body,
    pub query: HashMap<String, String>,
    pub user: Option<Value>,
}

impl From<&Request> for CallContext {
    fn from(req: &Request) -> Self {
        Self {
            method: req.method.clone(),
            headers: req.headers.clone(),
            body: req.body.clone(),
            query: req.query.clone(),
            user: req.user.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_json_body() {
        let body = Body::normalize(Some("application/json; charset=utf-8"), r#"{"a":1}"#);
        assert_eq!(body, Body::Json(json!({ "a": 1 })));
    }

    #[test]
    fn test_normalize_malformed_json_keeps_raw() {
        let body = Body::normalize(Some("application/json"), "{not json");
        assert_eq!(body, Body::Text("{not json".to_string()));
    }

    #[test]
    fn test_normalize_non_json_content_type() {
        let body = Body::normalize(Some("text/plain"), r#"{"a":1}"#);
        assert_eq!(body.as_text(), Some(r#"{"a":1}"#));
        assert_eq!(Body::normalize(None, "hello").as_text(), Some("hello"));
    }

    #[test]
    fn test_normalize_empty_body() {
        assert_eq!(Body::normalize(Some("application/json"), ""), Body::Json(json!({})));
        assert_eq!(Body::normalize(None, ""), Body::Json(json!({})));
    }

    #[test]
    fn test_json_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/vnd.api+json"));
        assert!(!is_json_content_type("text/html"));
    }

    #[test]
    fn test_target_path_strips_query() {
        let req = Request::new(Method::GET, "/test/with/path?and=querystring");
        assert_eq!(req.target_path(), "/test/with/path");
        assert_eq!(req.query.get("and").map(String::as_str), Some("querystring"));
    }

    #[test]
    fn test_target_path_prefers_adapter_path() {
        let req = Request::new(Method::GET, "/raw%20path?x=1").with_path("/raw path");
        assert_eq!(req.target_path(), "/raw path");
    }

    #[test]
    fn test_headers_are_lowercased() {
        let headers = lowercase_headers([("Content-Type", "application/json"), ("X-Id", "7")]);
        assert_eq!(headers.get("content-type").map(String::as_str), Some("application/json"));
        assert_eq!(headers.get("x-id").map(String::as_str), Some("7"));

        let req = Request::new(Method::POST, "/op").with_header("Authorization", "Bearer t");
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer t"));
    }

    #[test]
    fn test_set_raw_body_uses_content_type() {
        let mut req = Request::new(Method::POST, "/op").with_header("Content-Type", "application/json");
        req.set_raw_body(br#"{"text":"hello"}"#);
        assert_eq!(req.body.as_json(), Some(&json!({ "text": "hello" })));

        let mut req = Request::new(Method::POST, "/op");
        req.set_raw_body(b"plain");
        assert_eq!(req.body.as_text(), Some("plain"));
    }

    #[test]
    fn test_call_context_copies_request_data() {
        let mut req = Request::new(Method::PUT, "/op?a=1").with_body(Body::Json(json!([1])));
        req.user = Some(json!({ "username": "joe" }));
        let ctx = CallContext::from(&req);
        assert_eq!(ctx.method, Method::PUT);
        assert_eq!(ctx.query.get("a").map(String::as_str), Some("1"));
        assert_eq!(ctx.body, Body::Json(json!([1])));
        assert_eq!(ctx.user, Some(json!({ "username": "joe" })));
    }
}
