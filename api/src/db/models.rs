use duet_common::types::{Message, MessageId, MessageKind, PairId, UserId};
use serde::Serialize;

/// Timestamps are stored as RFC 3339 UTC text with millisecond precision on
/// both backends, so `ORDER BY created_at` and `created_at < ?` follow time
/// order without a driver-specific type.
pub type Timestamp = String;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub pair_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub reply_to_id: Option<String>,
    pub message_kind: String,
    pub body_text: Option<String>,
    pub media_url: Option<String>,
    pub media_mime: Option<String>,
    pub media_size_bytes: Option<i64>,
    pub media_duration_sec: Option<f64>,
    pub media_width: Option<i64>,
    pub media_height: Option<i64>,
    pub created_at: Timestamp,
    pub edited_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: MessageId::from(row.id),
            pair_id: PairId(row.pair_id),
            sender_id: UserId(row.sender_id),
            receiver_id: UserId(row.receiver_id),
            reply_to_id: row.reply_to_id.map(MessageId::from),
            message_kind: MessageKind::parse(&row.message_kind),
            body_text: row.body_text,
            media_url: row.media_url,
            media_mime: row.media_mime,
            media_size_bytes: row.media_size_bytes,
            media_duration_sec: row.media_duration_sec,
            media_width: row.media_width,
            media_height: row.media_height,
            created_at: row.created_at,
            edited_at: row.edited_at,
            deleted_at: row.deleted_at,
            read_at: row.read_at,
        }
    }
}

/// A pair whose second seat may still be empty.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PairRow {
    pub id: String,
    pub user1_id: String,
    pub user2_id: Option<String>,
    pub created_at: Timestamp,
}

impl PairRow {
    /// The other member of the pair, if `user_id` is in it and the pair is
    /// complete.
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        let user2 = self.user2_id.as_deref()?;
        if self.user1_id == user_id {
            Some(user2)
        } else if user2 == user_id {
            Some(&self.user1_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserPresenceRow {
    pub user_id: String,
    pub pair_id: String,
    pub last_seen_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl From<UserPresenceRow> for duet_common::types::PresenceRow {
    fn from(row: UserPresenceRow) -> Self {
        duet_common::types::PresenceRow {
            user_id: UserId(row.user_id),
            pair_id: PairId(row.pair_id),
            last_seen_at: row.last_seen_at,
        }
    }
}
