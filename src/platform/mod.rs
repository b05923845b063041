//! Platform adapters
//!
//! Each adapter turns a platform's inbound shape into a [`Request`] and the
//! buffered [`Response`] back into the platform's completion protocol. The
//! dispatcher never sees platform types.

pub mod aws;
pub mod azure;
pub mod detect;
pub mod service;

pub use aws::{Aws, ProxyEvent, ProxyResponse};
pub use azure::{Azure, AzureRequest, AzureResponse};
pub use detect::{detect, from_process_env, Platform, UnknownPlatform};

use crate::dispatch::Dispatcher;
use crate::http::{Request, Response};

/// Translation between a single-event platform and the common shapes
pub trait EventAdapter {
    type Event;
    type Output;

    fn to_request(&self, event: Self::Event) -> Request;

    fn to_output(&self, response: Response) -> Self::Output;
}

/// Dispatch one platform event and produce the platform's response value
pub async fn run_event<A>(adapter: &A, dispatcher: &Dispatcher, event: A::Event) -> A::Output
where
    A: EventAdapter + ?Sized,
{
    let mut req = adapter.to_request(event);
    let mut res = Response::new();
    dispatcher.handle(&mut req, &mut res).await;
    adapter.to_output(res)
}

/// Run one JSON-encoded event for an event-driven platform
///
/// Used for local invocation: the event document comes in, the platform
/// response document goes out.
pub async fn run_json_event(
    platform: Platform,
    dispatcher: &Dispatcher,
    event: &str,
) -> Result<String, serde_json::Error> {
    match platform {
        Platform::Aws => {
            let event: ProxyEvent = serde_json::from_str(event)?;
            serde_json::to_string(&run_event(&Aws, dispatcher, event).await)
        }
        Platform::Azure => {
            let event: AzureRequest = serde_json::from_str(event)?;
            serde_json::to_string(&run_event(&Azure, dispatcher, event).await)
        }
        Platform::Http | Platform::GoogleCloud => Err(serde::de::Error::custom(format!(
            "{platform} requests are served over HTTP, not as events"
        ))),
    }
}
