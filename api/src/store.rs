//! The message store collaborator over sqlx, bound to one acting participant.

use duet_common::StoreError;
use duet_common::store::{MessagePatch, MessageStore, NewMessage};
use duet_common::types::{Message, MessageId, MessageKind, Pairing, UserId, now_timestamp};
use duet_common::validate::MAX_PAGE_LIMIT;

use crate::db;
use crate::db::Db;
use crate::db::models::MessageRow;

/// Metadata of a media blob that is already in storage.
#[derive(Debug, Clone)]
pub struct NewMediaMessage {
    pub kind: MessageKind,
    pub media_url: String,
    pub media_mime: String,
    pub media_size_bytes: i64,
    pub media_duration_sec: Option<f64>,
    pub media_width: Option<i64>,
    pub media_height: Option<i64>,
    pub caption: Option<String>,
    pub reply_to_id: Option<MessageId>,
}

#[derive(Clone)]
pub struct SqlMessageStore {
    pool: Db,
    pairing: Pairing,
}

fn unavailable(e: sqlx::Error) -> StoreError {
    tracing::debug!("database error: {e}");
    StoreError::Unavailable("database error".into())
}

impl SqlMessageStore {
    pub fn new(pool: Db, pairing: Pairing) -> Self {
        Self { pool, pairing }
    }

    pub fn pairing(&self) -> &Pairing {
        &self.pairing
    }

    fn new_row(&self, reply_to_id: Option<&MessageId>, kind: MessageKind) -> MessageRow {
        MessageRow {
            id: uuid::Uuid::new_v4().to_string(),
            pair_id: self.pairing.pair_id.as_str().to_string(),
            sender_id: self.pairing.me.as_str().to_string(),
            receiver_id: self.pairing.partner.as_str().to_string(),
            reply_to_id: reply_to_id.map(|id| id.as_str().to_string()),
            message_kind: kind.as_str().to_string(),
            body_text: None,
            media_url: None,
            media_mime: None,
            media_size_bytes: None,
            media_duration_sec: None,
            media_width: None,
            media_height: None,
            created_at: now_timestamp(),
            edited_at: None,
            deleted_at: None,
            read_at: None,
        }
    }

    /// A reply must point at a delivered message of the same pair.
    async fn check_reply_target(&self, reply_to_id: Option<&MessageId>) -> Result<(), StoreError> {
        let Some(id) = reply_to_id else {
            return Ok(());
        };
        if id.is_placeholder() {
            return Err(StoreError::Invalid("reply target is not delivered".into()));
        }
        self.get(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("reply target not found".into()))
    }

    pub async fn get(&self, id: &MessageId) -> Result<Option<Message>, StoreError> {
        let row = db::messages::get_message(&self.pool, self.pairing.pair_id.as_str(), id.as_str())
            .await
            .map_err(unavailable)?;
        Ok(row.map(Message::from))
    }

    pub async fn insert_media(&self, media: &NewMediaMessage) -> Result<Message, StoreError> {
        if !media.kind.is_media() {
            return Err(StoreError::Invalid("not a media kind".into()));
        }
        self.check_reply_target(media.reply_to_id.as_ref()).await?;
        let mut row = self.new_row(media.reply_to_id.as_ref(), media.kind);
        row.body_text = media.caption.clone();
        row.media_url = Some(media.media_url.clone());
        row.media_mime = Some(media.media_mime.clone());
        row.media_size_bytes = Some(media.media_size_bytes);
        row.media_duration_sec = media.media_duration_sec;
        row.media_width = media.media_width;
        row.media_height = media.media_height;
        let row = db::messages::insert_message(&self.pool, &row)
            .await
            .map_err(unavailable)?;
        Ok(row.into())
    }

    /// Marks unread rows addressed to us as read; `None` means every one of
    /// them in the pair. Returns the changed rows and the timestamp used.
    pub async fn mark_read_rows(
        &self,
        ids: Option<&[MessageId]>,
    ) -> Result<(Vec<Message>, String), StoreError> {
        let read_at = now_timestamp();
        let ids: Option<Vec<String>> =
            ids.map(|ids| ids.iter().map(|id| id.as_str().to_string()).collect());
        let rows = db::messages::mark_read(
            &self.pool,
            self.pairing.pair_id.as_str(),
            self.pairing.me.as_str(),
            ids.as_deref(),
            &read_at,
        )
        .await
        .map_err(unavailable)?;
        Ok((rows.into_iter().map(Message::from).collect(), read_at))
    }
}

impl MessageStore for SqlMessageStore {
    async fn insert(&self, message: &NewMessage) -> Result<Message, StoreError> {
        if message.pair_id != self.pairing.pair_id || message.sender_id != self.pairing.me {
            return Err(StoreError::Unauthorized("not a member of this pair".into()));
        }
        self.check_reply_target(message.reply_to_id.as_ref()).await?;
        let mut row = self.new_row(message.reply_to_id.as_ref(), MessageKind::Text);
        row.body_text = Some(message.body_text.clone());
        let row = db::messages::insert_message(&self.pool, &row)
            .await
            .map_err(unavailable)?;
        Ok(row.into())
    }

    async fn update(&self, id: &MessageId, patch: &MessagePatch) -> Result<Message, StoreError> {
        let now = now_timestamp();
        let pair_id = self.pairing.pair_id.as_str();
        let me = self.pairing.me.as_str();
        let row = match patch {
            MessagePatch::Edit { body_text } => {
                db::messages::edit_message(&self.pool, pair_id, id.as_str(), me, body_text, &now)
                    .await
            }
            MessagePatch::Delete => {
                db::messages::soft_delete_message(&self.pool, pair_id, id.as_str(), me, &now).await
            }
        }
        .map_err(unavailable)?;
        row.map(Message::from)
            .ok_or_else(|| StoreError::Rejected("message not found or not editable".into()))
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<String, StoreError> {
        let (_, read_at) = self.mark_read_rows(Some(ids)).await?;
        Ok(read_at)
    }

    async fn list_before(
        &self,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        // Callers fetch `page + 1` rows, so allow one row past the page ceiling.
        let limit = limit.min(MAX_PAGE_LIMIT + 1) as i64;
        let rows =
            db::messages::list_before(&self.pool, self.pairing.pair_id.as_str(), before, limit)
                .await
                .map_err(unavailable)?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn last_seen_at(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        db::presence::get_last_seen(&self.pool, self.pairing.pair_id.as_str(), user_id.as_str())
            .await
            .map_err(unavailable)
    }
}
