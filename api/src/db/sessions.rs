use sha2::{Digest, Sha256};

use super::{Db, sql};

/// Tokens are only ever stored hashed.
pub fn hash_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// User owning a live session for `token`.
#[tracing::instrument(skip(pool, token), err)]
pub async fn find_user_by_token(
    pool: &Db,
    token: &str,
    now: &str,
) -> Result<Option<String>, sqlx::Error> {
    let q = sql("SELECT user_id FROM sessions
         WHERE token_hash = ? AND (expires_at IS NULL OR expires_at > ?)");
    let row: Option<(String,)> = sqlx::query_as(&q)
        .bind(hash_token(token))
        .bind(now)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(user_id,)| user_id))
}
