use super::models::PairRow;
use super::{Db, sql};

/// The pair `user_id` sits in, complete or not.
#[tracing::instrument(skip(pool), err)]
pub async fn get_pair_for_user(pool: &Db, user_id: &str) -> Result<Option<PairRow>, sqlx::Error> {
    let q = sql("SELECT * FROM pairs WHERE user1_id = ? OR user2_id = ? LIMIT 1");
    sqlx::query_as::<_, PairRow>(&q)
        .bind(user_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
