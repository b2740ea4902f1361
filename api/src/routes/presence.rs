use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use duet_common::types::{ChannelEvent, PresenceRow, now_timestamp};

use crate::AppState;
use crate::auth::Participant;
use crate::db;
use crate::error::AppError;

pub fn routes() -> Router<AppState> {
    Router::new().route("/presence/ping", post(ping))
}

/// Heartbeat: records "seen now" and tells the pair about it.
async fn ping(
    State(state): State<AppState>,
    participant: Participant,
) -> Result<Json<serde_json::Value>, AppError> {
    let pairing = &participant.pairing;
    let now = now_timestamp();
    let row = db::presence::touch(
        &state.pool,
        pairing.me.as_str(),
        pairing.pair_id.as_str(),
        &now,
    )
    .await?;

    let row = PresenceRow::from(row);
    state
        .hub
        .publish(&pairing.pair_id, ChannelEvent::Presence { row })
        .await;

    Ok(Json(serde_json::json!({ "ok": true, "at": now })))
}
