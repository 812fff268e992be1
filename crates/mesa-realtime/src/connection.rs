//! One credentialed streaming connection.
//!
//! Owns exactly one in-flight request and feeds its body through the frame
//! decoder until the server closes the stream, the owner cancels, or a read
//! fails. Reconnection is not this module's concern.

use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decoder::FrameDecoder;
use crate::error::{RealtimeError, Result};
use crate::event::StreamEvent;

/// Query parameter scoping the stream to one tenant.
const BUSINESS_ID_PARAM: &str = "businessId";

/// Why the read loop ended. Reported exactly once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamOutcome {
    /// The server ended the stream without an error.
    ClosedByServer,
    /// The owner cancelled the connection.
    Cancelled,
    /// The read loop failed while awaiting a chunk.
    ReadError(String),
}

/// Build the tenant-scoped stream URL.
pub(crate) fn stream_url(endpoint: &str, business_id: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    url.query_pairs_mut().append_pair(BUSINESS_ID_PARAM, business_id);
    Ok(url)
}

/// Open the stream and pump decoded records into `on_event` until closure,
/// cancellation, or a read error.
///
/// `on_open` fires once after a successful response, before the first read.
/// Records are delivered synchronously, in arrival order, and never after
/// cancellation.
///
/// # Errors
///
/// Returns an error if the request cannot be sent or the endpoint answers
/// with a non-success status; the caller treats this as an immediate
/// connection error.
pub(crate) async fn run<O, E>(
    http: &Client,
    url: Url,
    cancel: &CancellationToken,
    on_open: O,
    mut on_event: E,
) -> Result<StreamOutcome>
where
    O: FnOnce(),
    E: FnMut(StreamEvent),
{
    let request = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");

    let response = tokio::select! {
        resp = request.send() => resp?,
        () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RealtimeError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }

    tracing::debug!("Stream connection opened");
    on_open();

    let mut stream = response.bytes_stream();
    let mut decoder = FrameDecoder::new();

    loop {
        let next = tokio::select! {
            next = stream.next() => next,
            () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
        };

        match next {
            Some(Ok(chunk)) => {
                for event in decoder.push(&chunk) {
                    if cancel.is_cancelled() {
                        return Ok(StreamOutcome::Cancelled);
                    }
                    on_event(event);
                }
            }
            Some(Err(e)) => {
                tracing::warn!("Stream read error: {e}");
                return Ok(StreamOutcome::ReadError(e.to_string()));
            }
            None => return Ok(StreamOutcome::ClosedByServer),
        }
    }
}
