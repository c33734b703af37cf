use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::engine::MonitorHandle;

pub type EventStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Server-Sent Events stream of detected pulses.
///
/// Lagged receivers skip what they missed rather than closing the stream.
pub fn pulses(handle: &MonitorHandle) -> EventStream {
    let receiver = handle.subscribe_pulses();

    let stream = BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event) => json_event("pulse", &event),
            Err(_) => None,
        }
    });

    with_keep_alive(Box::pin(stream), "pulse-keepalive")
}

/// Server-Sent Events stream of live snapshots.
///
/// Opens with the current snapshot, then one event per published change.
pub fn live(handle: &MonitorHandle) -> EventStream {
    let receiver = handle.subscribe_live();
    let stream = WatchStream::new(receiver).filter_map(|stats| async move { json_event("live", &stats) });

    with_keep_alive(Box::pin(stream), "live-keepalive")
}

fn json_event<T: serde::Serialize>(name: &str, value: &T) -> Option<Result<Event, Infallible>> {
    serde_json::to_string(value)
        .ok()
        .map(|payload| Ok(Event::default().event(name).data(payload)))
}

fn with_keep_alive(
    stream: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>,
    text: &'static str,
) -> EventStream {
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(5)).text(text))
}
