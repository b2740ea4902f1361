#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};

use duet_common::StoreError;
use duet_common::store::{
    MediaUpload, MediaUploader, MessagePatch, MessageStore, NewMessage, TypingTransport,
};
use duet_common::types::{ChannelEvent, Message, MessageId, Pairing, PairId, UserId, format_timestamp};

pub fn pairing() -> Pairing {
    Pairing {
        pair_id: PairId::from("pair-1"),
        me: UserId::from("alice"),
        partner: UserId::from("bob"),
    }
}

/// In-memory message store acting as "alice", with configurable latency,
/// failure injection and an optional channel echo of every write.
pub struct FakeStore {
    pairing: Pairing,
    rows: Mutex<Vec<Message>>,
    clock: Mutex<DateTime<Utc>>,
    presence: Mutex<HashMap<UserId, String>>,
    latency: Duration,
    fail_writes: AtomicBool,
    echo: Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub read_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new(latency: Duration) -> Self {
        Self {
            pairing: pairing(),
            rows: Mutex::new(Vec::new()),
            clock: Mutex::new(Utc::now()),
            presence: Mutex::new(HashMap::new()),
            latency,
            fail_writes: AtomicBool::new(false),
            echo: Mutex::new(None),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// History of `n` messages, alternating senders, one second apart, all
    /// older than anything the store issues afterwards.
    pub async fn seed(&self, n: usize) {
        let base = *self.clock.lock().await;
        let mut rows = self.rows.lock().await;
        for i in 0..n {
            let created = base - chrono::Duration::seconds((n - i) as i64);
            let (sender, receiver) = if i % 2 == 0 {
                (&self.pairing.partner, &self.pairing.me)
            } else {
                (&self.pairing.me, &self.pairing.partner)
            };
            rows.push(Message::text(
                MessageId::confirmed(format!("seed-{i:03}")),
                self.pairing.pair_id.clone(),
                sender.clone(),
                receiver.clone(),
                format!("message {i}"),
                format_timestamp(created),
            ));
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn echo_to(&self, tx: mpsc::UnboundedSender<ChannelEvent>) {
        *self.echo.lock().await = Some(tx);
    }

    pub async fn set_last_seen(&self, user: &UserId, at: String) {
        self.presence.lock().await.insert(user.clone(), at);
    }

    pub async fn row_count(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Server-side insert made by the partner, as it would reach us over the
    /// channel.
    pub async fn insert_from_partner(&self, body: &str) -> Message {
        let row = Message::text(
            MessageId::confirmed(uuid_like()),
            self.pairing.pair_id.clone(),
            self.pairing.partner.clone(),
            self.pairing.me.clone(),
            body,
            self.tick().await,
        );
        self.rows.lock().await.push(row.clone());
        row
    }

    async fn tick(&self) -> String {
        let mut clock = self.clock.lock().await;
        let now = Utc::now().max(*clock + chrono::Duration::milliseconds(1));
        *clock = now;
        format_timestamp(now)
    }

    async fn publish(&self, event: ChannelEvent) {
        if let Some(tx) = self.echo.lock().await.as_ref() {
            let _ = tx.send(event);
        }
    }

    async fn store_new(&self, mut row: Message) -> Result<Message, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            tokio::time::sleep(self.latency).await;
            return Err(StoreError::Unavailable("server error".into()));
        }
        row.id = MessageId::confirmed(uuid_like());
        row.created_at = self.tick().await;
        self.rows.lock().await.push(row.clone());
        self.publish(ChannelEvent::Insert { row: row.clone() }).await;
        tokio::time::sleep(self.latency).await;
        Ok(row)
    }
}

fn uuid_like() -> String {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    format!("srv-{:06}", NEXT.fetch_add(1, Ordering::SeqCst))
}

impl MessageStore for FakeStore {
    async fn insert(&self, message: &NewMessage) -> Result<Message, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut row = Message::text(
            MessageId::placeholder(),
            message.pair_id.clone(),
            message.sender_id.clone(),
            message.receiver_id.clone(),
            message.body_text.clone(),
            String::new(),
        );
        row.reply_to_id = message.reply_to_id.clone();
        self.store_new(row).await
    }

    async fn update(&self, id: &MessageId, patch: &MessagePatch) -> Result<Message, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("server error".into()));
        }
        let now = self.tick().await;
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|m| &m.id == id && m.sender_id == self.pairing.me && m.deleted_at.is_none())
            .ok_or_else(|| StoreError::Rejected("message cannot be changed".into()))?;
        match patch {
            MessagePatch::Edit { body_text } => {
                row.body_text = Some(body_text.clone());
                row.edited_at = Some(now);
            }
            MessagePatch::Delete => {
                row.body_text = None;
                row.media_url = None;
                row.deleted_at = Some(now);
            }
        }
        let row = row.clone();
        drop(rows);
        self.publish(ChannelEvent::Update { row: row.clone() }).await;
        Ok(row)
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<String, StoreError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let now = self.tick().await;
        let mut rows = self.rows.lock().await;
        for row in rows.iter_mut() {
            if ids.contains(&row.id) && row.is_unread_for(&self.pairing.me) {
                row.read_at = Some(now.clone());
            }
        }
        Ok(now)
    }

    async fn list_before(
        &self,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let rows = self.rows.lock().await;
        let mut older: Vec<Message> = rows
            .iter()
            .filter(|m| before.is_none_or(|b| m.created_at.as_str() < b))
            .cloned()
            .collect();
        older.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        older.truncate(limit);
        Ok(older)
    }

    async fn last_seen_at(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        Ok(self.presence.lock().await.get(user_id).cloned())
    }
}

impl MediaUploader for FakeStore {
    async fn upload(&self, upload: &MediaUpload) -> Result<Message, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut row = Message::text(
            MessageId::placeholder(),
            self.pairing.pair_id.clone(),
            self.pairing.me.clone(),
            self.pairing.partner.clone(),
            String::new(),
            String::new(),
        );
        row.body_text = upload.caption.clone();
        row.message_kind = upload.kind;
        row.media_url = Some(format!("/media/{}", uuid_like()));
        row.media_mime = Some(upload.mime.clone());
        row.media_size_bytes = Some(upload.size_bytes());
        row.media_duration_sec = upload.duration_sec;
        row.media_width = upload.width;
        row.media_height = upload.height;
        row.reply_to_id = upload.reply_to_id.clone();
        self.store_new(row).await
    }
}

/// Records every typing broadcast.
#[derive(Default)]
pub struct RecordingTyping {
    pub sent: Mutex<Vec<bool>>,
}

impl TypingTransport for RecordingTyping {
    async fn send_typing(&self, is_typing: bool) -> Result<(), StoreError> {
        self.sent.lock().await.push(is_typing);
        Ok(())
    }
}
