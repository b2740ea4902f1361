use super::models::UserPresenceRow;
use super::{Db, sql};

/// Records a heartbeat. One row per user; a user who changed pairs moves
/// their row along.
#[tracing::instrument(skip(pool), err)]
pub async fn touch(
    pool: &Db,
    user_id: &str,
    pair_id: &str,
    now: &str,
) -> Result<UserPresenceRow, sqlx::Error> {
    let q = sql("INSERT INTO user_presence (user_id, pair_id, last_seen_at, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (user_id) DO UPDATE SET
            pair_id = excluded.pair_id,
            last_seen_at = excluded.last_seen_at,
            updated_at = excluded.updated_at
         RETURNING *");
    sqlx::query_as::<_, UserPresenceRow>(&q)
        .bind(user_id)
        .bind(pair_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
}

#[tracing::instrument(skip(pool), err)]
pub async fn get_last_seen(
    pool: &Db,
    pair_id: &str,
    user_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    let q = sql("SELECT last_seen_at FROM user_presence WHERE pair_id = ? AND user_id = ?");
    let row: Option<(Option<String>,)> = sqlx::query_as(&q)
        .bind(pair_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.and_then(|(last_seen_at,)| last_seen_at))
}
