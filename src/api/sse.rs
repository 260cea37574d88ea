//! Server-Sent Events support

use crate::runtime::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

type Payload = (&'static str, serde_json::Value);

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = payload_stream(init_event, broadcast_rx).map(|(event_type, data)| {
        Ok(Event::default().event(event_type).data(data.to_string()))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Init payload first, then one payload per broadcast.
///
/// A subscriber that falls behind the channel gets a `resync` event in
/// place of the messages it missed; the page refetches with
/// `after_sequence`.
fn payload_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> impl Stream<Item = Payload> {
    let init = futures::stream::once(async move { event_payload(init_event) });

    let broadcasts = BroadcastStream::new(broadcast_rx).map(|result| match result {
        Ok(event) => event_payload(event),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "SSE subscriber lagged");
            (
                "resync",
                json!({
                    "type": "resync",
                    "skipped": skipped
                }),
            )
        }
    });

    init.chain(broadcasts)
}

fn event_payload(event: SseEvent) -> Payload {
    match event {
        SseEvent::Init { snapshot } => (
            "init",
            json!({
                "type": "init",
                "messages": snapshot.messages,
                "pending": snapshot.pending,
                "last_sequence_id": snapshot.last_sequence_id
            }),
        ),
        SseEvent::Message { message } => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        SseEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state,
                "pending": state.is_pending()
            }),
        ),
        SseEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    }
}
