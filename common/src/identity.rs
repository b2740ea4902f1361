//! Placeholder-to-canonical identity reconciliation.

use crate::merge::merge;
use crate::types::{Message, MessageId, UserId};

/// Swaps the newest unresolved placeholder authored by `owner` for
/// `canonical`.
///
/// Falls back to a plain merge when the canonical row is already present (a
/// second delivery of the same insert) or when `owner` has no placeholder
/// left. Either way the canonical id ends up in the store exactly once, so
/// the confirmation and the channel echo may arrive in any order.
pub fn reconcile(existing: &[Message], canonical: Message, owner: &UserId) -> Vec<Message> {
    if existing.iter().any(|m| m.id == canonical.id) {
        return merge(existing, &[canonical]);
    }

    let placeholder = existing
        .iter()
        .rposition(|m| m.id.is_placeholder() && &m.sender_id == owner);

    match placeholder {
        Some(index) => {
            let mut remaining = existing.to_vec();
            let removed = remaining.remove(index);
            tracing::debug!(
                placeholder = %removed.id,
                canonical = %canonical.id,
                "reconciled placeholder"
            );
            merge(&remaining, &[canonical])
        }
        None => merge(existing, &[canonical]),
    }
}

/// Replaces one specific placeholder with its canonical row.
///
/// Used when the send call itself answers: the orchestrator knows exactly which
/// placeholder it minted.
pub fn confirm_placeholder(
    existing: &[Message],
    placeholder: &MessageId,
    canonical: Message,
) -> Vec<Message> {
    let remaining: Vec<Message> = existing
        .iter()
        .filter(|m| &m.id != placeholder)
        .cloned()
        .collect();
    merge(&remaining, &[canonical])
}

/// Removes a placeholder whose send failed.
pub fn discard_placeholder(existing: &[Message], placeholder: &MessageId) -> Vec<Message> {
    existing
        .iter()
        .filter(|m| &m.id != placeholder)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::tests::msg;

    fn alice() -> UserId {
        UserId::from("alice")
    }

    fn store_with_placeholder() -> Vec<Message> {
        vec![
            msg("m1", "bob", "hello", "2026-03-01T10:00:00.000Z"),
            msg("temp-1", "alice", "Hi", "2026-03-01T10:00:05.000Z"),
        ]
    }

    fn canonical() -> Message {
        msg("srv-9", "alice", "Hi", "2026-03-01T10:00:05.120Z")
    }

    #[test]
    fn placeholder_is_replaced_not_appended() {
        let existing = store_with_placeholder();
        let out = reconcile(&existing, canonical(), &alice());
        assert_eq!(out.len(), existing.len());
        assert!(out.iter().all(|m| !m.id.is_placeholder()));
        assert_eq!(out.iter().filter(|m| m.id.as_str() == "srv-9").count(), 1);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let once = reconcile(&store_with_placeholder(), canonical(), &alice());
        let twice = reconcile(&once, canonical(), &alice());
        assert_eq!(once, twice);
    }

    #[test]
    fn echo_does_not_consume_another_pending_send() {
        let once = reconcile(&store_with_placeholder(), canonical(), &alice());
        let mut pending = once.clone();
        pending.push(msg("temp-2", "alice", "again", "2026-03-01T10:00:09.000Z"));

        let out = reconcile(&pending, canonical(), &alice());
        assert!(out.iter().any(|m| m.id.as_str() == "temp-2"));
        assert_eq!(out.len(), pending.len());
    }

    #[test]
    fn newest_placeholder_is_chosen() {
        let existing = vec![
            msg("temp-a", "alice", "first", "2026-03-01T10:00:01.000Z"),
            msg("temp-b", "alice", "second", "2026-03-01T10:00:02.000Z"),
        ];
        let out = reconcile(&existing, canonical(), &alice());
        let remaining: Vec<&str> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(remaining, vec!["temp-a", "srv-9"]);
    }

    #[test]
    fn partner_placeholder_is_never_touched() {
        let existing = vec![msg("temp-x", "bob", "typing...", "2026-03-01T10:00:01.000Z")];
        let out = reconcile(&existing, canonical(), &alice());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn confirm_targets_exact_placeholder() {
        let existing = vec![
            msg("temp-a", "alice", "first", "2026-03-01T10:00:01.000Z"),
            msg("temp-b", "alice", "second", "2026-03-01T10:00:02.000Z"),
        ];
        let out = confirm_placeholder(&existing, &MessageId::from("temp-a"), canonical());
        let remaining: Vec<&str> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(remaining, vec!["temp-b", "srv-9"]);
    }

    #[test]
    fn discard_removes_only_the_failed_send() {
        let out = discard_placeholder(&store_with_placeholder(), &MessageId::from("temp-1"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id.as_str(), "m1");
    }
}
