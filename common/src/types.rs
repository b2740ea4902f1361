use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new_v4() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

newtype_id!(UserId);
newtype_id!(PairId);

/// Prefix that marks a client-minted, not yet acknowledged message id.
pub const PLACEHOLDER_PREFIX: &str = "temp-";

/// Identity of a message: either minted locally before the server answered,
/// or assigned by the server.
///
/// On the wire both forms are plain strings; the placeholder form carries
/// [`PLACEHOLDER_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageId {
    Pending(String),
    Confirmed(String),
}

impl MessageId {
    /// Mints a fresh placeholder id.
    pub fn placeholder() -> Self {
        MessageId::Pending(format!("{PLACEHOLDER_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    pub fn confirmed(id: impl Into<String>) -> Self {
        MessageId::Confirmed(id.into())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, MessageId::Pending(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageId::Pending(id) | MessageId::Confirmed(id) => id,
        }
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        if s.starts_with(PLACEHOLDER_PREFIX) {
            MessageId::Pending(s)
        } else {
            MessageId::Confirmed(s)
        }
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId::from(s.to_string())
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        match id {
            MessageId::Pending(id) | MessageId::Confirmed(id) => id,
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Image,
    Voice,
    VideoNote,
    /// Unknown kinds decode as text.
    #[default]
    #[serde(other)]
    Text,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Voice => "voice",
            MessageKind::VideoNote => "video_note",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "voice" => MessageKind::Voice,
            "video_note" => MessageKind::VideoNote,
            _ => MessageKind::Text,
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub url: String,
    pub mime: Option<String>,
    pub size_bytes: Option<i64>,
    pub duration_sec: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// One conversation message, field-for-field the store row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub pair_id: PairId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(default)]
    pub reply_to_id: Option<MessageId>,
    #[serde(default)]
    pub message_kind: MessageKind,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_mime: Option<String>,
    #[serde(default)]
    pub media_size_bytes: Option<i64>,
    #[serde(default)]
    pub media_duration_sec: Option<f64>,
    #[serde(default)]
    pub media_width: Option<i64>,
    #[serde(default)]
    pub media_height: Option<i64>,
    pub created_at: String,
    #[serde(default)]
    pub edited_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub read_at: Option<String>,
}

impl Message {
    /// A text message with no optional attributes set.
    pub fn text(
        id: MessageId,
        pair_id: PairId,
        sender_id: UserId,
        receiver_id: UserId,
        body_text: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id,
            pair_id,
            sender_id,
            receiver_id,
            reply_to_id: None,
            message_kind: MessageKind::Text,
            body_text: Some(body_text.into()),
            media_url: None,
            media_mime: None,
            media_size_bytes: None,
            media_duration_sec: None,
            media_width: None,
            media_height: None,
            created_at: created_at.into(),
            edited_at: None,
            deleted_at: None,
            read_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Body as the UI should render it; nothing survives a delete.
    pub fn visible_body(&self) -> Option<&str> {
        if self.is_deleted() {
            return None;
        }
        self.body_text.as_deref().filter(|b| !b.is_empty())
    }

    /// Media attachment as the UI should render it; nothing survives a delete.
    pub fn media(&self) -> Option<MediaDescriptor> {
        if self.is_deleted() || !self.message_kind.is_media() {
            return None;
        }
        let url = self.media_url.clone()?;
        Some(MediaDescriptor {
            url,
            mime: self.media_mime.clone(),
            size_bytes: self.media_size_bytes,
            duration_sec: self.media_duration_sec,
            width: self.media_width,
            height: self.media_height,
        })
    }

    pub fn is_unread_for(&self, user_id: &UserId) -> bool {
        &self.receiver_id == user_id && self.read_at.is_none()
    }
}

/// Last heartbeat of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRow {
    pub user_id: UserId,
    pub pair_id: PairId,
    pub last_seen_at: Option<String>,
}

/// Event pushed over the shared real-time channel of a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    Insert { row: Message },
    Update { row: Message },
    Presence { row: PresenceRow },
    Typing { user_id: UserId, is_typing: bool },
}

/// The two participants of a conversation, resolved once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub pair_id: PairId,
    pub me: UserId,
    pub partner: UserId,
}

/// Formats a timestamp the way the store issues them: RFC 3339, UTC,
/// millisecond precision, `Z` suffix. Lexical order equals time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parses an RFC 3339 timestamp into milliseconds since the epoch.
pub fn parse_timestamp_ms(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc).timestamp_millis())
}

/// Re-formats any RFC 3339 timestamp into the canonical store format.
pub fn normalize_timestamp(s: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|t| format_timestamp(t.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_round_trips_placeholder_prefix() {
        let id: MessageId = serde_json::from_str("\"temp-1700000000\"").unwrap();
        assert!(id.is_placeholder());
        let id: MessageId = serde_json::from_str("\"7f1c0e7a-1111\"").unwrap();
        assert_eq!(id, MessageId::confirmed("7f1c0e7a-1111"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7f1c0e7a-1111\"");
    }

    #[test]
    fn minted_placeholders_are_unique() {
        let a = MessageId::placeholder();
        let b = MessageId::placeholder();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(PLACEHOLDER_PREFIX));
    }

    #[test]
    fn unknown_kind_decodes_as_text() {
        let kind: MessageKind = serde_json::from_str("\"sticker\"").unwrap();
        assert_eq!(kind, MessageKind::Text);
        let kind: MessageKind = serde_json::from_str("\"video_note\"").unwrap();
        assert_eq!(kind, MessageKind::VideoNote);
        let kind: MessageKind = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(kind, MessageKind::Text);
        assert_eq!(MessageKind::parse("voice"), MessageKind::Voice);
    }

    #[test]
    fn deleted_message_exposes_no_body_or_media() {
        let mut m = Message::text(
            MessageId::confirmed("m1"),
            PairId::from("p"),
            UserId::from("a"),
            UserId::from("b"),
            "hello",
            "2026-01-01T00:00:00.000Z",
        );
        m.message_kind = MessageKind::Image;
        m.media_url = Some("/media/1.png".into());
        assert!(m.media().is_some());
        m.deleted_at = Some("2026-01-01T00:01:00.000Z".into());
        assert_eq!(m.visible_body(), None);
        assert_eq!(m.media(), None);
    }

    #[test]
    fn channel_event_wire_shape() {
        let json = r#"{"type":"typing","user_id":"b","is_typing":true}"#;
        let event: ChannelEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ChannelEvent::Typing {
                user_id: UserId::from("b"),
                is_typing: true
            }
        );

        let json = r#"{"type":"insert","row":{"id":"m1","pair_id":"p","sender_id":"a","receiver_id":"b","message_kind":"text","body_text":"hi","created_at":"2026-01-01T00:00:00.000Z"}}"#;
        let ChannelEvent::Insert { row } = serde_json::from_str(json).unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(row.id, MessageId::confirmed("m1"));
        assert_eq!(row.read_at, None);
    }

    #[test]
    fn timestamps_normalize_to_millis_utc() {
        assert_eq!(
            normalize_timestamp("2026-01-01T03:00:00+03:00").as_deref(),
            Some("2026-01-01T00:00:00.000Z")
        );
        assert_eq!(parse_timestamp_ms("nope"), None);
        assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01.000Z"), Some(1000));
    }
}
