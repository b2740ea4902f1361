use std::collections::HashMap;

use crate::types::{Message, MessageId};

/// Folds `incoming` into `existing`, keyed by message id.
///
/// Later rows replace earlier rows with the same id (canonical rows always
/// carry the full record). A replaced row keeps the slot of the first
/// occurrence, and the result is stably sorted by `created_at`, so rows
/// sharing a timestamp stay in first-seen order.
pub fn merge(existing: &[Message], incoming: &[Message]) -> Vec<Message> {
    let mut slots: HashMap<&MessageId, usize> =
        HashMap::with_capacity(existing.len() + incoming.len());
    let mut merged: Vec<Message> = Vec::with_capacity(existing.len() + incoming.len());

    for message in existing.iter().chain(incoming) {
        match slots.get(&message.id) {
            Some(&slot) => merged[slot] = message.clone(),
            None => {
                slots.insert(&message.id, merged.len());
                merged.push(message.clone());
            }
        }
    }

    merged.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    merged
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use rand::seq::SliceRandom;

    use super::*;
    use crate::types::{PairId, UserId};

    pub(crate) fn msg(id: &str, sender: &str, body: &str, created_at: &str) -> Message {
        let receiver = if sender == "alice" { "bob" } else { "alice" };
        Message::text(
            MessageId::from(id),
            PairId::from("pair-1"),
            UserId::from(sender),
            UserId::from(receiver),
            body,
            created_at,
        )
    }

    fn ts(second: u32) -> String {
        format!("2026-03-01T10:00:{second:02}.000Z")
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn merge_sorts_by_created_at() {
        let existing = vec![msg("b", "alice", "2", &ts(2)), msg("c", "bob", "3", &ts(3))];
        let incoming = vec![msg("a", "bob", "1", &ts(1))];
        assert_eq!(ids(&merge(&existing, &incoming)), vec!["a", "b", "c"]);
    }

    #[test]
    fn incoming_row_replaces_existing_row() {
        let existing = vec![msg("a", "alice", "draft", &ts(1))];
        let mut edited = msg("a", "alice", "final", &ts(1));
        edited.edited_at = Some(ts(5));
        let merged = merge(&existing, &[edited]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].body_text.as_deref(), Some("final"));
        assert!(merged[0].is_edited());
    }

    #[test]
    fn update_for_unknown_message_is_accepted() {
        let existing = vec![msg("a", "alice", "x", &ts(1)), msg("c", "bob", "z", &ts(3))];
        let mut update = msg("b", "bob", "y", &ts(2));
        update.edited_at = Some(ts(9));
        let merged = merge(&existing, &[update]);
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_timestamps_keep_first_seen_order() {
        let existing = vec![msg("x", "alice", "1", &ts(1)), msg("y", "bob", "2", &ts(1))];
        let merged = merge(&existing, &[msg("x", "alice", "1'", &ts(1))]);
        assert_eq!(ids(&merged), vec!["x", "y"]);
    }

    #[test]
    fn arbitrary_delivery_order_converges() {
        let rows: Vec<Message> = (0..40)
            .map(|i| msg(&format!("m{i}"), "bob", "hey", &ts(i % 60)))
            .collect();
        let mut events: Vec<Message> = rows.iter().chain(rows.iter().step_by(3)).cloned().collect();
        let mut rng = rand::thread_rng();

        for _ in 0..20 {
            events.shuffle(&mut rng);
            let mut store: Vec<Message> = Vec::new();
            for chunk in events.chunks(7) {
                store = merge(&store, chunk);
            }

            let unique: HashSet<&str> = store.iter().map(|m| m.id.as_str()).collect();
            assert_eq!(unique.len(), store.len());
            assert_eq!(store.len(), rows.len());
            assert!(store.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        }
    }
}
