//! Generic HTTP adapter
//!
//! Serves the dispatcher as a hyper service. This is also the shape Google
//! Cloud Functions use: a plain `(request, response)` pair.

use std::borrow::Cow;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::http::request::Parts;

use crate::dispatch::{DispatchError, Dispatcher};
use crate::http::{into_hyper_response, lowercase_headers, Request, Response};

/// Build the request head: method, URL, decoded path, query and headers
///
/// The body is left empty; see [`read_body`].
pub fn request_from_parts(parts: Parts) -> Request {
    let url = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    let raw_path = parts.uri.path();
    let path = urlencoding::decode(raw_path).map_or_else(
        |_| {
            tracing::debug!(path = raw_path, "path is not valid percent-encoded UTF-8, using it raw");
            raw_path.to_string()
        },
        Cow::into_owned,
    );

    let headers = lowercase_headers(parts.headers.iter().filter_map(|(name, value)| {
        value
            .to_str()
            .ok()
            .map(|value| (name.as_str(), value.to_string()))
    }));

    let mut request = Request::new(parts.method, url).with_path(path);
    request.headers = headers;
    request.extensions = parts.extensions;
    request
}

/// Collect a body, refusing anything larger than `max_body_size`
pub async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, DispatchError>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(DispatchError::with_status(
            413,
            format!("Request body too large (max: {max_body_size} bytes)"),
        )),
        Err(e) => Err(DispatchError::invalid_input(format!("Failed to read request body: {e}"))),
    }
}

/// Convert a hyper request into a dispatch request, body included
pub async fn read_request<B>(
    req: hyper::Request<B>,
    max_body_size: u64,
) -> Result<Request, DispatchError>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let mut request = request_from_parts(parts);
    let bytes = read_body(body, max_body_size).await?;
    request.set_raw_body(&bytes);
    Ok(request)
}

/// Dispatch a hyper request and build the hyper response
///
/// Body read failures (size limit, broken stream) go through the
/// dispatcher's error handler like any other dispatch error.
pub async fn serve<B>(
    dispatcher: &Dispatcher,
    req: hyper::Request<B>,
    max_body_size: u64,
) -> hyper::Response<Full<Bytes>>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let mut request = request_from_parts(parts);
    let mut response = Response::new();

    match read_body(body, max_body_size).await {
        Ok(bytes) => {
            request.set_raw_body(&bytes);
            dispatcher.handle(&mut request, &mut response).await;
        }
        Err(err) => {
            crate::logger::log_warning(&format!("{} {}: {err}", request.method, request.url));
            dispatcher.report_error(&err, &request, &mut response);
        }
    }

    into_hyper_response(response)
}
