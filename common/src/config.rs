use std::time::Duration;

/// Default number of messages per page.
pub const DEFAULT_PAGE_LIMIT: usize = 50;
/// A partner counts as online if their last heartbeat is at most this old.
pub const PRESENCE_THRESHOLD: Duration = Duration::from_secs(90);
/// Minimum spacing between two "is typing" broadcasts while input stays non-empty.
pub const TYPING_EMIT_INTERVAL: Duration = Duration::from_millis(650);
/// Lifetime of a received "is typing" signal absent a refresh.
pub const TYPING_TTL: Duration = Duration::from_millis(2500);

/// Tunables of one conversation session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_limit: usize,
    pub presence_threshold: Duration,
    pub typing_emit_interval: Duration,
    pub typing_ttl: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            presence_threshold: PRESENCE_THRESHOLD,
            typing_emit_interval: TYPING_EMIT_INTERVAL,
            typing_ttl: TYPING_TTL,
        }
    }
}

impl SyncConfig {
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = crate::validate::clamp_page_limit(limit as i64);
        self
    }
}
