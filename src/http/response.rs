//! HTTP response module
//!
//! [`ResponseSink`] is the write-once response capability the dispatcher
//! writes through; [`Response`] is the buffered implementation every
//! platform adapter translates into its own completion protocol.

use std::collections::BTreeMap;

use http_body_util::Full;
use hyper::body::Bytes;
use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Response capability handed to middleware, handlers and the error handler
///
/// At most one terminal write (`json`, `send`, `end`) is honoured per
/// request. Once [`headers_sent`](Self::headers_sent) reports `true`, further
/// writes of any kind are ignored.
pub trait ResponseSink: Send {
    fn status(&mut self, status: u16);

    fn set_header(&mut self, name: &str, value: &str);

    /// Terminal write: serialise `value` as the JSON body
    fn json(&mut self, value: &Value);

    /// Terminal write: raw body bytes
    fn send(&mut self, body: Bytes);

    /// Terminal write with an empty body
    fn end(&mut self) {
        self.send(Bytes::new());
    }

    fn headers_sent(&self) -> bool;
}

/// Buffered, write-once response
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Bytes,
    sent: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: Bytes::new(),
            sent: false,
        }
    }

    pub const fn status_code(&self) -> u16 {
        self.status
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON, `None` when empty or not JSON
    pub fn body_json(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    /// Take the body out, leaving the response otherwise untouched
    pub fn into_parts(self) -> (u16, BTreeMap<String, String>, Bytes) {
        (self.status, self.headers, self.body)
    }

    fn finish(&mut self, body: Bytes) {
        if self.sent {
            tracing::debug!(status = self.status, "response already sent, ignoring write");
            return;
        }
        self.body = body;
        self.sent = true;
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for Response {
    fn status(&mut self, status: u16) {
        if !self.sent {
            self.status = status;
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if !self.sent {
            self.headers
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    fn json(&mut self, value: &Value) {
        if self.sent {
            tracing::debug!(status = self.status, "response already sent, ignoring json write");
            return;
        }
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_header("content-type", JSON_CONTENT_TYPE);
                self.finish(Bytes::from(body));
            }
            Err(e) => {
                crate::logger::log_error(&format!("Failed to serialize response body: {e}"));
                self.status = 500;
                self.finish(Bytes::new());
            }
        }
    }

    fn send(&mut self, body: Bytes) {
        self.finish(body);
    }

    fn headers_sent(&self) -> bool {
        self.sent
    }
}

/// Convert a buffered response into a hyper response
pub fn into_hyper_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let (status, headers, body) = response.into_parts();
    let content_length = body.len();
    let mut builder = hyper::Response::builder().status(status);
    // the buffered body decides the length
    for (name, value) in headers.iter().filter(|(name, _)| *name != "content-length") {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .header("content-length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(&status.to_string(), &e);
            build_500_response()
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> hyper::Response<Full<Bytes>> {
    hyper::Response::builder()
        .status(500)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("500 Internal Server Error")))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            hyper::Response::new(Full::new(Bytes::new()))
        })
}

/// Build 503 Service Unavailable response, used when the connection limit is hit
pub fn build_503_response() -> hyper::Response<Full<Bytes>> {
    hyper::Response::builder()
        .status(503)
        .header("Content-Type", "text/plain")
        .header("Retry-After", "1")
        .body(Full::new(Bytes::from("503 Service Unavailable")))
        .unwrap_or_else(|e| {
            log_build_error("503", &e);
            hyper::Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_write_sets_content_type() {
        let mut res = Response::new();
        res.status(201);
        res.json(&json!({ "id": 7 }));
        assert_eq!(res.status_code(), 201);
        assert!(res.is_json());
        assert_eq!(res.body_json(), Some(json!({ "id": 7 })));
        assert!(res.headers_sent());
    }

    #[test]
    fn test_second_terminal_write_is_ignored() {
        let mut res = Response::new();
        res.send(Bytes::from("first"));
        res.status(500);
        res.set_header("x-late", "1");
        res.json(&json!("second"));
        res.end();
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body_text(), "first");
        assert_eq!(res.header("x-late"), None);
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let mut res = Response::new();
        res.set_header("X-Request-Id", "abc");
        assert_eq!(res.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn test_into_hyper_response() {
        let mut res = Response::new();
        res.status(204);
        res.set_header("x-trace", "t1");
        res.end();
        let hyper_res = into_hyper_response(res);
        assert_eq!(hyper_res.status(), 204);
        assert_eq!(hyper_res.headers()["x-trace"], "t1");
        assert_eq!(hyper_res.headers()["content-length"], "0");
    }

    #[test]
    fn test_handler_content_length_is_replaced() {
        let mut res = Response::new();
        res.set_header("Content-Length", "5");
        res.send(Bytes::from_static(b"hello, world"));
        let hyper_res = into_hyper_response(res);
        let lengths: Vec<_> = hyper_res.headers().get_all("content-length").iter().collect();
        assert_eq!(lengths, vec!["12"]);
    }
}
