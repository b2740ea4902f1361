use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use duet_common::config::DEFAULT_PAGE_LIMIT;
use duet_common::pagination;
use duet_common::store::{MessagePatch, MessageStore, NewMessage};
use duet_common::types::{ChannelEvent, Message, MessageId, MessageKind, normalize_timestamp};
use duet_common::validate::{clamp_page_limit, validate_body, validate_caption, validate_media};
use serde::Deserialize;

use crate::AppState;
use crate::auth::Participant;
use crate::error::AppError;
use crate::store::{NewMediaMessage, SqlMessageStore};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/messages", get(get_messages).post(post_message))
        .route(
            "/chat/messages/{message_id}",
            get(get_message)
                .patch(patch_message)
                .delete(delete_message),
        )
        .route("/chat/media", post(post_media))
        .route("/chat/read", post(post_read))
}

fn store_for(state: &AppState, participant: &Participant) -> SqlMessageStore {
    SqlMessageStore::new(state.pool.clone(), participant.pairing.clone())
}

/// Blank ids are treated as absent.
fn optional_id(id: Option<String>) -> Option<MessageId> {
    id.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(MessageId::from)
}

#[derive(Deserialize)]
struct MessageQuery {
    limit: Option<i64>,
    before: Option<String>,
}

/// Bootstrap (no `before`) or an older page.
async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    participant: Participant,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = clamp_page_limit(query.limit.unwrap_or(DEFAULT_PAGE_LIMIT as i64));
    let before = match query.before.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            normalize_timestamp(raw)
                .ok_or_else(|| AppError::BadRequest("invalid before cursor".into()))?,
        ),
    };

    let store = store_for(&state, &participant);
    let page = pagination::load_older(&store, before.as_deref(), limit).await?;
    let pairing = &participant.pairing;
    let partner_last_seen_at = store.last_seen_at(&pairing.partner).await?;

    Ok(Json(serde_json::json!({
        "pair_id": pairing.pair_id,
        "me": pairing.me,
        "partner": pairing.partner,
        "partner_last_seen_at": partner_last_seen_at,
        "messages": page.messages,
        "has_more": page.has_more,
    })))
}

async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    participant: Participant,
) -> Result<Json<serde_json::Value>, AppError> {
    let message = store_for(&state, &participant)
        .get(&MessageId::from(message_id))
        .await?
        .ok_or_else(|| AppError::NotFound("message not found".into()))?;
    Ok(message_response(&message))
}

async fn publish(state: &AppState, participant: &Participant, event: ChannelEvent) {
    let receivers = state.hub.publish(&participant.pairing.pair_id, event).await;
    tracing::debug!(pair_id = %participant.pairing.pair_id, receivers, "published event");
}

fn message_response(message: &Message) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": message }))
}

#[derive(Deserialize)]
struct PostMessageBody {
    text: String,
    reply_to_id: Option<String>,
}

async fn post_message(
    State(state): State<AppState>,
    participant: Participant,
    Json(body): Json<PostMessageBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body_text = validate_body(&body.text)?;
    let pairing = &participant.pairing;
    let draft = NewMessage {
        pair_id: pairing.pair_id.clone(),
        sender_id: pairing.me.clone(),
        receiver_id: pairing.partner.clone(),
        reply_to_id: optional_id(body.reply_to_id),
        body_text,
    };

    let message = store_for(&state, &participant).insert(&draft).await?;
    publish(
        &state,
        &participant,
        ChannelEvent::Insert {
            row: message.clone(),
        },
    )
    .await;
    Ok(message_response(&message))
}

#[derive(Deserialize)]
struct PostMediaBody {
    kind: MessageKind,
    media_url: String,
    media_mime: String,
    media_size_bytes: i64,
    media_duration_sec: Option<f64>,
    media_width: Option<i64>,
    media_height: Option<i64>,
    text: Option<String>,
    reply_to_id: Option<String>,
}

/// Registers a blob that was already uploaded as a media message.
async fn post_media(
    State(state): State<AppState>,
    participant: Participant,
    Json(body): Json<PostMediaBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let media_url = body.media_url.trim();
    if media_url.is_empty() {
        return Err(AppError::BadRequest("media_url is required".into()));
    }
    validate_media(
        body.kind,
        &body.media_mime,
        body.media_size_bytes,
        body.media_duration_sec,
    )?;
    let caption = validate_caption(body.text.as_deref())?;

    let media = NewMediaMessage {
        kind: body.kind,
        media_url: media_url.to_string(),
        media_mime: body.media_mime.trim().to_string(),
        media_size_bytes: body.media_size_bytes,
        media_duration_sec: body.media_duration_sec,
        media_width: body.media_width.filter(|&w| w > 0),
        media_height: body.media_height.filter(|&h| h > 0),
        caption,
        reply_to_id: optional_id(body.reply_to_id),
    };
    let message = store_for(&state, &participant).insert_media(&media).await?;
    publish(
        &state,
        &participant,
        ChannelEvent::Insert {
            row: message.clone(),
        },
    )
    .await;
    Ok(message_response(&message))
}

#[derive(Deserialize)]
struct PatchMessageBody {
    text: String,
}

async fn patch_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    participant: Participant,
    Json(body): Json<PatchMessageBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body_text = validate_body(&body.text)?;
    let message = store_for(&state, &participant)
        .update(&MessageId::from(message_id), &MessagePatch::Edit { body_text })
        .await?;
    publish(
        &state,
        &participant,
        ChannelEvent::Update {
            row: message.clone(),
        },
    )
    .await;
    Ok(message_response(&message))
}

async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    participant: Participant,
) -> Result<Json<serde_json::Value>, AppError> {
    let message = store_for(&state, &participant)
        .update(&MessageId::from(message_id), &MessagePatch::Delete)
        .await?;
    publish(
        &state,
        &participant,
        ChannelEvent::Update {
            row: message.clone(),
        },
    )
    .await;
    Ok(message_response(&message))
}

#[derive(Deserialize, Default)]
struct ReadBody {
    message_ids: Option<Vec<String>>,
}

/// Read receipts. Without ids (or with only blank ones) every unread message
/// addressed to the caller is stamped.
async fn post_read(
    State(state): State<AppState>,
    participant: Participant,
    body: Option<Json<ReadBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let ids: Vec<MessageId> = body
        .message_ids
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| optional_id(Some(id)))
        .collect();
    let ids = (!ids.is_empty()).then_some(ids.as_slice());

    let (rows, read_at) = store_for(&state, &participant)
        .mark_read_rows(ids)
        .await?;
    let updated = rows.len();
    for row in rows {
        publish(&state, &participant, ChannelEvent::Update { row }).await;
    }

    Ok(Json(serde_json::json!({
        "updated": updated,
        "read_at": read_at,
    })))
}
