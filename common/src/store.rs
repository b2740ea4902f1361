//! Collaborator seams: the relational message store, the media upload
//! service and the typing broadcast of the real-time channel.

use std::future::Future;

use crate::error::StoreError;
use crate::types::{Message, MessageId, MessageKind, PairId, UserId};

/// Row to insert for a text send.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub pair_id: PairId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub reply_to_id: Option<MessageId>,
    pub body_text: String,
}

/// In-place mutation of an existing row. The store stamps `edited_at` /
/// `deleted_at` and only applies the patch to a non-deleted row sent by the
/// acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePatch {
    Edit { body_text: String },
    Delete,
}

/// Media captured or selected on the device, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpload {
    pub kind: MessageKind,
    pub mime: String,
    pub data: Vec<u8>,
    pub duration_sec: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub caption: Option<String>,
    pub reply_to_id: Option<MessageId>,
}

impl MediaUpload {
    pub fn size_bytes(&self) -> i64 {
        self.data.len() as i64
    }
}

/// Message store as seen by one authenticated participant.
pub trait MessageStore: Send + Sync {
    fn insert(
        &self,
        message: &NewMessage,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    fn update(
        &self,
        id: &MessageId,
        patch: &MessagePatch,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Stamps every listed row addressed to the acting user that is still
    /// unread, returning the read timestamp used.
    fn mark_read(
        &self,
        ids: &[MessageId],
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Up to `limit` rows strictly older than `before`, newest first.
    /// `None` lists from the most recent row.
    fn list_before(
        &self,
        before: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    fn last_seen_at(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;
}

/// Blob upload followed by the row insert; answers with the canonical row.
pub trait MediaUploader: Send + Sync {
    fn upload(
        &self,
        upload: &MediaUpload,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;
}

/// Broadcast side of the typing signal.
pub trait TypingTransport: Send + Sync {
    fn send_typing(&self, is_typing: bool) -> impl Future<Output = Result<(), StoreError>> + Send;
}
