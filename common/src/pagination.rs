use serde::Serialize;

use crate::error::SyncError;
use crate::merge::merge;
use crate::store::MessageStore;
use crate::types::Message;

/// One page of history in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

impl Page {
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            has_more: false,
        }
    }
}

/// Turns a newest-first fetch of up to `limit + 1` rows into a page: the extra
/// row only signals that more history exists and is dropped.
pub fn paginate(mut rows: Vec<Message>, limit: usize) -> Page {
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    rows.reverse();
    Page {
        messages: rows,
        has_more,
    }
}

/// Cursor for the next older page: the `created_at` of the oldest
/// server-confirmed message held locally.
pub fn cursor(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .filter(|m| !m.id.is_placeholder())
        .map(|m| m.created_at.as_str())
        .min()
}

/// Fetches the page strictly older than `before` (or the most recent page).
pub async fn load_older<S: MessageStore>(
    store: &S,
    before: Option<&str>,
    limit: usize,
) -> Result<Page, SyncError> {
    let rows = store.list_before(before, limit + 1).await?;
    let page = paginate(rows, limit);
    tracing::debug!(
        before = before.unwrap_or("<latest>"),
        fetched = page.messages.len(),
        has_more = page.has_more,
        "loaded page"
    );
    Ok(page)
}

/// Places an older page in front of the held messages. Held rows win over
/// page rows with the same id since they may carry newer updates.
pub fn prepend(existing: &[Message], page: &Page) -> Vec<Message> {
    merge(&page.messages, existing)
}
