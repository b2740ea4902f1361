//! One open conversation: optimistic sends, confirmed edits, channel folding,
//! pagination, presence and typing behind a single handle.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::error::{StoreError, SyncError};
use crate::identity::{confirm_placeholder, discard_placeholder, reconcile};
use crate::merge::merge;
use crate::pagination::{self, Page};
use crate::presence::PresenceTracker;
use crate::preview::LocalPreview;
use crate::store::{MediaUpload, MediaUploader, MessagePatch, MessageStore, NewMessage, TypingTransport};
use crate::typing::{TypingEmitter, TypingIndicator};
use crate::types::{ChannelEvent, Message, MessageId, Pairing, now_timestamp};
use crate::validate::{validate_body, validate_caption, validate_media};

/// What folding one channel event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Own insert echoed back; any matching placeholder is gone.
    Reconciled(MessageId),
    /// A new message from the partner. Callers usually acknowledge it with
    /// [`ChatSession::mark_read`] once it is on screen.
    IncomingFromPartner(MessageId),
    /// Row update (edit, delete, read receipt) folded in.
    Updated(MessageId),
    PresenceChanged,
    /// Partner typing state changed; `generation` identifies the dead-man
    /// timer to hand to [`ChatSession::expire_typing`].
    Typing { active: bool, generation: u64 },
    Ignored,
}

struct ConversationState {
    messages: Vec<Message>,
    has_more: bool,
    presence: PresenceTracker,
    partner_typing: TypingIndicator,
    emitter: TypingEmitter,
}

/// Handle to one conversation. Clones share the same state, so a channel
/// listener task and the UI can hold it at once. The state lock is never held
/// across a collaborator call.
pub struct ChatSession<S, U, T> {
    pairing: Arc<Pairing>,
    config: SyncConfig,
    store: Arc<S>,
    uploader: Arc<U>,
    typing: Arc<T>,
    state: Arc<RwLock<ConversationState>>,
    loading_older: Arc<AtomicBool>,
}

impl<S, U, T> Clone for ChatSession<S, U, T> {
    fn clone(&self) -> Self {
        Self {
            pairing: self.pairing.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            uploader: self.uploader.clone(),
            typing: self.typing.clone(),
            state: self.state.clone(),
            loading_older: self.loading_older.clone(),
        }
    }
}

impl<S, U, T> ChatSession<S, U, T>
where
    S: MessageStore,
    U: MediaUploader,
    T: TypingTransport,
{
    /// Loads the most recent page and the partner's last heartbeat.
    #[tracing::instrument(skip_all, fields(pair_id = %pairing.pair_id), err)]
    pub async fn open(
        pairing: Pairing,
        store: Arc<S>,
        uploader: Arc<U>,
        typing: Arc<T>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let page = pagination::load_older(store.as_ref(), None, config.page_limit).await?;

        // Presence is advisory; a failed lookup only means "offline".
        let last_seen_at = match store.last_seen_at(&pairing.partner).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "presence lookup failed");
                None
            }
        };

        let state = ConversationState {
            messages: page.messages,
            has_more: page.has_more,
            presence: PresenceTracker::new(
                pairing.partner.clone(),
                last_seen_at,
                config.presence_threshold,
            ),
            partner_typing: TypingIndicator::new(config.typing_ttl),
            emitter: TypingEmitter::new(config.typing_emit_interval),
        };

        Ok(Self {
            pairing: Arc::new(pairing),
            config,
            store,
            uploader,
            typing,
            state: Arc::new(RwLock::new(state)),
            loading_older: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn pairing(&self) -> &Pairing {
        &self.pairing
    }

    /// Snapshot of the ordered, de-duplicated message list.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.state.read().await.has_more
    }

    pub async fn is_partner_online(&self) -> bool {
        self.is_partner_online_at(chrono::Utc::now().timestamp_millis())
            .await
    }

    pub async fn is_partner_online_at(&self, now_ms: i64) -> bool {
        self.state.read().await.presence.is_online(now_ms)
    }

    pub async fn is_partner_typing(&self) -> bool {
        self.state
            .read()
            .await
            .partner_typing
            .is_active(Instant::now())
    }

    /// Optimistically appends a text message, then swaps in the server row or
    /// removes the placeholder if the send fails.
    pub async fn send_text(
        &self,
        text: &str,
        reply_to_id: Option<MessageId>,
    ) -> Result<Message, SyncError> {
        let body = validate_body(text)?;
        check_reply_target(reply_to_id.as_ref())?;

        let mut placeholder = self.placeholder(reply_to_id.clone());
        placeholder.body_text = Some(body.clone());
        let placeholder_id = placeholder.id.clone();
        let pending = self.insert_placeholder(placeholder).await;

        let draft = NewMessage {
            pair_id: self.pairing.pair_id.clone(),
            sender_id: self.pairing.me.clone(),
            receiver_id: self.pairing.partner.clone(),
            reply_to_id,
            body_text: body,
        };
        let result = self.store.insert(&draft).await;
        let resolved = self.resolve_placeholder(&placeholder_id, result).await;
        pending.resolved();
        resolved
    }

    /// Same shape as [`send_text`](Self::send_text) for an image, voice note
    /// or video note. The local preview is shown until the send resolves and
    /// released afterwards.
    pub async fn send_media(
        &self,
        upload: MediaUpload,
        preview: Option<LocalPreview>,
    ) -> Result<Message, SyncError> {
        validate_media(
            upload.kind,
            &upload.mime,
            upload.size_bytes(),
            upload.duration_sec,
        )?;
        let caption = validate_caption(upload.caption.as_deref())?;
        check_reply_target(upload.reply_to_id.as_ref())?;

        let mut placeholder = self.placeholder(upload.reply_to_id.clone());
        placeholder.message_kind = upload.kind;
        placeholder.body_text = caption.clone();
        placeholder.media_url = preview.as_ref().map(|p| p.url().to_string());
        placeholder.media_mime = Some(upload.mime.clone());
        placeholder.media_size_bytes = Some(upload.size_bytes());
        placeholder.media_duration_sec = upload.duration_sec;
        placeholder.media_width = upload.width;
        placeholder.media_height = upload.height;
        let placeholder_id = placeholder.id.clone();
        let pending = self.insert_placeholder(placeholder).await;

        let upload = MediaUpload { caption, ..upload };
        let result = self.uploader.upload(&upload).await;
        let resolved = self.resolve_placeholder(&placeholder_id, result).await;
        pending.resolved();
        drop(preview);
        resolved
    }

    /// Replaces the body of one of our messages. Not optimistic: the list
    /// changes only once the store returns the edited row.
    pub async fn edit_message(&self, id: &MessageId, text: &str) -> Result<Message, SyncError> {
        let body = validate_body(text)?;
        self.apply_patch(id, MessagePatch::Edit { body_text: body })
            .await
    }

    /// Soft-deletes one of our messages. Not optimistic.
    pub async fn delete_message(&self, id: &MessageId) -> Result<Message, SyncError> {
        self.apply_patch(id, MessagePatch::Delete).await
    }

    /// Acknowledges every visible message addressed to us that is still unread
    /// in one batch. Returns how many rows were stamped locally.
    pub async fn mark_read(&self, visible: &[MessageId]) -> Result<usize, SyncError> {
        let visible: HashSet<&MessageId> = visible.iter().collect();
        let unread: Vec<MessageId> = {
            let state = self.state.read().await;
            state
                .messages
                .iter()
                .filter(|m| {
                    !m.id.is_placeholder()
                        && visible.contains(&m.id)
                        && m.is_unread_for(&self.pairing.me)
                })
                .map(|m| m.id.clone())
                .collect()
        };
        if unread.is_empty() {
            return Ok(0);
        }

        let read_at = self.store.mark_read(&unread).await.inspect_err(|e| {
            tracing::warn!(error = %e, count = unread.len(), "mark read failed");
        })?;

        let unread: HashSet<MessageId> = unread.into_iter().collect();
        let mut state = self.state.write().await;
        let mut stamped = 0;
        for message in state.messages.iter_mut() {
            if unread.contains(&message.id) && message.read_at.is_none() {
                message.read_at = Some(read_at.clone());
                stamped += 1;
            }
        }
        Ok(stamped)
    }

    /// Fetches the page just older than the oldest confirmed message and
    /// merges it in front. Concurrent calls collapse into one; the extra
    /// callers get an empty page. Dropping the future releases the slot.
    pub async fn load_older(&self) -> Result<Page, SyncError> {
        let Some(_loading) = LoadingOlder::acquire(&self.loading_older) else {
            return Ok(Page::empty());
        };
        let before = {
            let state = self.state.read().await;
            match pagination::cursor(&state.messages) {
                Some(before) => before.to_string(),
                None => return Ok(Page::empty()),
            }
        };

        let page =
            pagination::load_older(self.store.as_ref(), Some(&before), self.config.page_limit)
                .await?;

        let mut state = self.state.write().await;
        state.messages = pagination::prepend(&state.messages, &page);
        state.has_more = page.has_more;
        Ok(page)
    }

    /// Feeds the current composer input; broadcasts a typing flag when the
    /// throttle allows. Returns whether anything was sent.
    pub async fn notify_typing(&self, current_input: &str) -> Result<bool, SyncError> {
        let now = chrono::Utc::now().timestamp_millis();
        let flag = self.state.write().await.emitter.observe(current_input, now);
        let Some(is_typing) = flag else {
            return Ok(false);
        };
        self.typing.send_typing(is_typing).await?;
        Ok(true)
    }

    /// Folds one real-time channel event into the session.
    pub async fn apply_event(&self, event: ChannelEvent) -> EventOutcome {
        let me = &self.pairing.me;
        let mut state = self.state.write().await;
        match event {
            ChannelEvent::Insert { row } | ChannelEvent::Update { row }
                if row.pair_id != self.pairing.pair_id =>
            {
                tracing::debug!(message_id = %row.id, "ignoring row of another pair");
                EventOutcome::Ignored
            }
            ChannelEvent::Insert { row } if &row.sender_id == me => {
                let id = row.id.clone();
                state.messages = reconcile(&state.messages, row, me);
                EventOutcome::Reconciled(id)
            }
            ChannelEvent::Insert { row } => {
                let id = row.id.clone();
                state.messages = merge(&state.messages, &[row]);
                EventOutcome::IncomingFromPartner(id)
            }
            ChannelEvent::Update { row } => {
                let id = row.id.clone();
                state.messages = merge(&state.messages, &[row]);
                EventOutcome::Updated(id)
            }
            ChannelEvent::Presence { row } => {
                if row.pair_id == self.pairing.pair_id && state.presence.apply(&row) {
                    EventOutcome::PresenceChanged
                } else {
                    EventOutcome::Ignored
                }
            }
            ChannelEvent::Typing { user_id, is_typing } => {
                if user_id != self.pairing.partner {
                    return EventOutcome::Ignored;
                }
                let generation = state.partner_typing.on_signal(is_typing, Instant::now());
                EventOutcome::Typing {
                    active: is_typing,
                    generation,
                }
            }
        }
    }

    /// Dead-man timer callback; clears the indicator unless a newer typing
    /// signal arrived after `generation` was issued.
    pub async fn expire_typing(&self, generation: u64) -> bool {
        self.state.write().await.partner_typing.expire(generation)
    }

    /// Sleeps for the typing TTL, then fires [`expire_typing`](Self::expire_typing).
    /// Meant to be spawned for each `EventOutcome::Typing { active: true, .. }`.
    pub async fn run_typing_timer(&self, generation: u64) -> bool {
        tokio::time::sleep(self.config.typing_ttl).await;
        self.expire_typing(generation).await
    }

    fn placeholder(&self, reply_to_id: Option<MessageId>) -> Message {
        let mut message = Message::text(
            MessageId::placeholder(),
            self.pairing.pair_id.clone(),
            self.pairing.me.clone(),
            self.pairing.partner.clone(),
            String::new(),
            now_timestamp(),
        );
        message.body_text = None;
        message.reply_to_id = reply_to_id;
        message
    }

    async fn insert_placeholder(&self, placeholder: Message) -> PendingSend {
        let placeholder_id = placeholder.id.clone();
        let mut state = self.state.write().await;
        state.messages = merge(&state.messages, &[placeholder]);
        PendingSend {
            state: self.state.clone(),
            placeholder_id: Some(placeholder_id),
        }
    }

    async fn resolve_placeholder(
        &self,
        placeholder_id: &MessageId,
        result: Result<Message, StoreError>,
    ) -> Result<Message, SyncError> {
        let mut state = self.state.write().await;
        match result {
            Ok(row) => {
                state.messages = confirm_placeholder(&state.messages, placeholder_id, row.clone());
                tracing::debug!(placeholder = %placeholder_id, message_id = %row.id, "send confirmed");
                Ok(row)
            }
            Err(e) => {
                state.messages = discard_placeholder(&state.messages, placeholder_id);
                tracing::warn!(placeholder = %placeholder_id, error = %e, "send failed, rolled back");
                Err(e.into())
            }
        }
    }

    async fn apply_patch(&self, id: &MessageId, patch: MessagePatch) -> Result<Message, SyncError> {
        if id.is_placeholder() {
            return Err(SyncError::Validation("message is not delivered yet".into()));
        }
        let row = self.store.update(id, &patch).await.inspect_err(|e| {
            tracing::warn!(message_id = %id, error = %e, "message update failed");
        })?;
        let mut state = self.state.write().await;
        state.messages = merge(&state.messages, &[row.clone()]);
        Ok(row)
    }
}

/// Holds the single `load_older` slot until dropped.
struct LoadingOlder(Arc<AtomicBool>);

impl LoadingOlder {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for LoadingOlder {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Placeholder of a send in flight. Unless the send resolved, dropping it
/// removes the placeholder from the list.
struct PendingSend {
    state: Arc<RwLock<ConversationState>>,
    placeholder_id: Option<MessageId>,
}

impl PendingSend {
    fn resolved(mut self) {
        self.placeholder_id = None;
    }
}

impl Drop for PendingSend {
    fn drop(&mut self) {
        let Some(placeholder_id) = self.placeholder_id.take() else {
            return;
        };
        tracing::warn!(placeholder = %placeholder_id, "send abandoned, rolled back");
        if let Ok(mut state) = self.state.try_write() {
            state.messages = discard_placeholder(&state.messages, &placeholder_id);
            return;
        }
        // Lock is busy; finish the rollback once it frees up.
        let state = self.state.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut state = state.write().await;
                    state.messages = discard_placeholder(&state.messages, &placeholder_id);
                });
            }
            Err(_) => {
                tracing::error!(placeholder = %placeholder_id, "no runtime to roll back abandoned send");
            }
        }
    }
}

fn check_reply_target(reply_to_id: Option<&MessageId>) -> Result<(), SyncError> {
    match reply_to_id {
        Some(id) if id.is_placeholder() => Err(SyncError::Validation(
            "cannot reply to a message that is not delivered yet".into(),
        )),
        _ => Ok(()),
    }
}
