use std::time::Duration;

use crate::config::PRESENCE_THRESHOLD;
use crate::types::{PresenceRow, UserId, parse_timestamp_ms};

/// Whether a heartbeat at `last_seen_at` still counts as online at `now_ms`.
/// Missing or unparseable timestamps count as offline.
pub fn is_online(last_seen_at: Option<&str>, now_ms: i64) -> bool {
    is_online_within(last_seen_at, now_ms, PRESENCE_THRESHOLD)
}

pub fn is_online_within(last_seen_at: Option<&str>, now_ms: i64, threshold: Duration) -> bool {
    let Some(seen_ms) = last_seen_at.and_then(parse_timestamp_ms) else {
        return false;
    };
    now_ms.saturating_sub(seen_ms) <= threshold.as_millis() as i64
}

/// Latest presence record of the partner. Purely advisory: the heartbeat that
/// refreshes it lives outside the core.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    partner: UserId,
    last_seen_at: Option<String>,
    threshold: Duration,
}

impl PresenceTracker {
    pub fn new(partner: UserId, last_seen_at: Option<String>, threshold: Duration) -> Self {
        Self {
            partner,
            last_seen_at,
            threshold,
        }
    }

    /// Takes a presence row from the channel; rows of other users are ignored.
    pub fn apply(&mut self, row: &PresenceRow) -> bool {
        if row.user_id != self.partner {
            return false;
        }
        self.last_seen_at = row.last_seen_at.clone();
        true
    }

    pub fn last_seen_at(&self) -> Option<&str> {
        self.last_seen_at.as_deref()
    }

    pub fn is_online(&self, now_ms: i64) -> bool {
        is_online_within(self.last_seen_at.as_deref(), now_ms, self.threshold)
    }
}
