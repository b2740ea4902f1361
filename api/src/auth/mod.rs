use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use duet_common::types::{Pairing, PairId, UserId, now_timestamp};

use crate::AppState;
use crate::db;
use crate::db::Db;
use crate::error::AppError;

/// Authenticated participant extracted from the Authorization header.
///
/// The header carries `Bearer <session token>`; the token is looked up (hashed)
/// in the `sessions` table, then the user's pair is resolved. A user without a
/// complete pair cannot use the chat.
#[derive(Debug, Clone)]
pub struct Participant {
    pub pairing: Pairing,
}

impl Participant {
    pub fn user_id(&self) -> &UserId {
        &self.pairing.me
    }
}

pub(crate) async fn authenticate(pool: &Db, auth_header: &str) -> Result<Participant, AppError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a bearer token".into()))?;

    let user_id = db::sessions::find_user_by_token(pool, token, &now_timestamp())
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid or expired session".into()))?;

    let pair = db::pairs::get_pair_for_user(pool, &user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("create a pair first".into()))?;
    let partner = pair
        .partner_of(&user_id)
        .ok_or_else(|| AppError::Forbidden("partner has not joined yet".into()))?
        .to_string();

    Ok(Participant {
        pairing: Pairing {
            pair_id: PairId(pair.id),
            me: UserId(user_id),
            partner: UserId(partner),
        },
    })
}

impl FromRequestParts<AppState> for Participant {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".into()))?;

        authenticate(&state.pool, auth_header).await
    }
}

#[cfg(all(test, not(feature = "postgres")))]
mod tests {
    use super::*;
    use crate::db::fixtures::memory_pool;

    #[tokio::test]
    async fn resolves_pairing_from_either_seat() {
        let pool = memory_pool().await;
        let alice = authenticate(&pool, "Bearer alice").await.unwrap();
        assert_eq!(alice.pairing.partner.as_str(), "bob");
        let bob = authenticate(&pool, "Bearer bob").await.unwrap();
        assert_eq!(bob.pairing.partner.as_str(), "alice");
        assert_eq!(alice.pairing.pair_id, bob.pairing.pair_id);
    }

    #[tokio::test]
    async fn rejects_bad_credentials_and_unpaired_users() {
        let pool = memory_pool().await;
        assert!(matches!(
            authenticate(&pool, "alice").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&pool, "Bearer mallory").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&pool, "Bearer carol").await,
            Err(AppError::Forbidden(_))
        ));
    }
}
