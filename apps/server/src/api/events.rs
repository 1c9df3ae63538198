use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_core::stream::Stream;
use serde::Deserialize;
use tidemark_core::events::channel_for_account;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::{events::ServerEvent, main_lib::AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamQuery {
    /// Restrict the stream to one account's private channel.
    account_id: Option<String>,
}

fn on_channel(event: &ServerEvent, channel: Option<&str>) -> bool {
    match (channel, &event.payload) {
        (None, _) => true,
        (Some(wanted), Some(payload)) => payload["channel"] == wanted,
        (Some(_), None) => false,
    }
}

fn to_sse(event: ServerEvent) -> Option<SseEvent> {
    let sse_event = SseEvent::default().event(event.name);
    match event.payload {
        Some(payload) => match sse_event.json_data(payload) {
            Ok(ev) => Some(ev),
            Err(err) => {
                tracing::error!("Failed to serialize SSE payload for {}: {}", event.name, err);
                None
            }
        },
        None => Some(sse_event.data("null")),
    }
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let channel = query.account_id.as_deref().map(channel_for_account);
    let receiver = BroadcastStream::new(state.event_bus.subscribe());
    let stream = tokio_stream::StreamExt::filter_map(receiver, move |event| match event {
        Ok(evt) if on_channel(&evt, channel.as_deref()) => to_sse(evt).map(Ok),
        Ok(_) => None,
        // A slow client misses updates; the next capture brings it current.
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!("SSE client lagged, {} events dropped", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events/stream", get(stream_events))
}
