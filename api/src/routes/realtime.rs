use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use duet_common::types::ChannelEvent;
use serde::Deserialize;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::AppState;
use crate::auth::Participant;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/events", get(events))
        .route("/chat/typing", post(post_typing))
}

fn event_name(event: &ChannelEvent) -> &'static str {
    match event {
        ChannelEvent::Insert { .. } => "insert",
        ChannelEvent::Update { .. } => "update",
        ChannelEvent::Presence { .. } => "presence",
        ChannelEvent::Typing { .. } => "typing",
    }
}

/// Server-Sent Events stream of the caller's pair.
///
/// A subscriber that falls behind the channel capacity receives a `lagged`
/// event and should reload from `GET /v1/chat/messages`.
async fn events(
    State(state): State<AppState>,
    participant: Participant,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.hub.subscribe(&participant.pairing.pair_id).await;
    let user_id = participant.user_id().clone();
    tracing::info!(%user_id, pair_id = %participant.pairing.pair_id, "event stream opened");

    let stream = BroadcastStream::new(rx)
        .filter_map(move |item| match item {
            Ok(event) => match Event::default().event(event_name(&event)).json_data(&event) {
                Ok(sse) => Some(sse),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode channel event");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(%user_id, skipped, "event subscriber lagged");
                Some(Event::default().event("lagged").data(skipped.to_string()))
            }
        })
        .map(Ok::<Event, Infallible>);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.config.sse_keepalive)
            .text("keep-alive"),
    )
}

#[derive(Deserialize)]
struct TypingBody {
    is_typing: bool,
}

async fn post_typing(
    State(state): State<AppState>,
    participant: Participant,
    Json(body): Json<TypingBody>,
) -> Json<serde_json::Value> {
    let pairing = &participant.pairing;
    state
        .hub
        .publish(
            &pairing.pair_id,
            ChannelEvent::Typing {
                user_id: pairing.me.clone(),
                is_typing: body.is_typing,
            },
        )
        .await;
    Json(serde_json::json!({ "ok": true }))
}
