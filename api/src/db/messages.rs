use super::models::MessageRow;
use super::{Db, placeholders, sql};

#[tracing::instrument(skip(pool), err)]
pub async fn get_message(
    pool: &Db,
    pair_id: &str,
    id: &str,
) -> Result<Option<MessageRow>, sqlx::Error> {
    let q = sql("SELECT * FROM messages WHERE id = ? AND pair_id = ?");
    sqlx::query_as::<_, MessageRow>(&q)
        .bind(id)
        .bind(pair_id)
        .fetch_optional(pool)
        .await
}

#[tracing::instrument(skip(pool, row), fields(id = %row.id, kind = %row.message_kind), err)]
pub async fn insert_message(pool: &Db, row: &MessageRow) -> Result<MessageRow, sqlx::Error> {
    let q = sql("INSERT INTO messages (
            id, pair_id, sender_id, receiver_id, reply_to_id, message_kind, body_text,
            media_url, media_mime, media_size_bytes, media_duration_sec, media_width,
            media_height, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING *");
    sqlx::query_as::<_, MessageRow>(&q)
        .bind(&row.id)
        .bind(&row.pair_id)
        .bind(&row.sender_id)
        .bind(&row.receiver_id)
        .bind(&row.reply_to_id)
        .bind(&row.message_kind)
        .bind(&row.body_text)
        .bind(&row.media_url)
        .bind(&row.media_mime)
        .bind(row.media_size_bytes)
        .bind(row.media_duration_sec)
        .bind(row.media_width)
        .bind(row.media_height)
        .bind(&row.created_at)
        .fetch_one(pool)
        .await
}

/// Up to `limit` rows of the pair strictly older than `before`, newest first.
#[tracing::instrument(skip(pool), err)]
pub async fn list_before(
    pool: &Db,
    pair_id: &str,
    before: Option<&str>,
    limit: i64,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    match before {
        Some(before) => {
            let q = sql("SELECT * FROM messages WHERE pair_id = ? AND created_at < ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?");
            sqlx::query_as::<_, MessageRow>(&q)
                .bind(pair_id)
                .bind(before)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
        None => {
            let q = sql("SELECT * FROM messages WHERE pair_id = ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?");
            sqlx::query_as::<_, MessageRow>(&q)
                .bind(pair_id)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
    }
}

/// Replaces the body of a live message sent by `sender_id`. `None` when no
/// row matched (missing, deleted, or someone else's).
#[tracing::instrument(skip(pool, body_text), err)]
pub async fn edit_message(
    pool: &Db,
    pair_id: &str,
    id: &str,
    sender_id: &str,
    body_text: &str,
    edited_at: &str,
) -> Result<Option<MessageRow>, sqlx::Error> {
    let q = sql("UPDATE messages SET body_text = ?, edited_at = ?
         WHERE id = ? AND pair_id = ? AND sender_id = ? AND deleted_at IS NULL
         RETURNING *");
    sqlx::query_as::<_, MessageRow>(&q)
        .bind(body_text)
        .bind(edited_at)
        .bind(id)
        .bind(pair_id)
        .bind(sender_id)
        .fetch_optional(pool)
        .await
}

/// Soft delete: the row stays for ordering and reply references, its content
/// does not.
#[tracing::instrument(skip(pool), err)]
pub async fn soft_delete_message(
    pool: &Db,
    pair_id: &str,
    id: &str,
    sender_id: &str,
    deleted_at: &str,
) -> Result<Option<MessageRow>, sqlx::Error> {
    let q = sql("UPDATE messages SET body_text = NULL, media_url = NULL, deleted_at = ?
         WHERE id = ? AND pair_id = ? AND sender_id = ? AND deleted_at IS NULL
         RETURNING *");
    sqlx::query_as::<_, MessageRow>(&q)
        .bind(deleted_at)
        .bind(id)
        .bind(pair_id)
        .bind(sender_id)
        .fetch_optional(pool)
        .await
}

/// Stamps `read_at` on unread rows addressed to `receiver_id`, restricted to
/// `ids` when given. Returns the rows that changed.
#[tracing::instrument(skip(pool, ids), fields(count = ids.map_or(0, <[String]>::len)), err)]
pub async fn mark_read(
    pool: &Db,
    pair_id: &str,
    receiver_id: &str,
    ids: Option<&[String]>,
    read_at: &str,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    let mut q = String::from(
        "UPDATE messages SET read_at = ?
         WHERE pair_id = ? AND receiver_id = ? AND read_at IS NULL",
    );
    if let Some(ids) = ids {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        q.push_str(&format!(" AND id IN ({})", placeholders(ids.len())));
    }
    q.push_str(" RETURNING *");

    let q = sql(&q);
    let mut query = sqlx::query_as::<_, MessageRow>(&q)
        .bind(read_at)
        .bind(pair_id)
        .bind(receiver_id);
    for id in ids.unwrap_or_default() {
        query = query.bind(id);
    }
    query.fetch_all(pool).await
}
