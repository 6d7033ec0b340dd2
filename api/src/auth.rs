use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::decode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// The token is a JWT minted by the external identity provider; its `sub`
/// claim is the owning user id. Every store key starts with this id, so
/// authorization falls out of key scoping — handlers never filter rows
/// after the fact.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the user id.
    pub sub: String,
    /// Expiry, seconds since epoch.
    pub exp: i64,
}

/// Verify a bearer token and extract the user id from its subject claim.
pub fn verify_token(auth: &AuthConfig, token: &str) -> Result<AuthenticatedUser, AppError> {
    let data =
        decode::<Claims>(token, &auth.decoding_key, &auth.validation).map_err(|err| {
            tracing::warn!(error = %err, "bearer token rejected");
            AppError::Unauthorized {
                message: "Invalid or expired bearer token".to_string(),
            }
        })?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized {
        message: "Token subject is not a valid user id".to_string(),
    })?;

    Ok(AuthenticatedUser { user_id })
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authorization header must use Bearer scheme".to_string(),
            })?;

        verify_token(&state.auth, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &[u8] = b"test-secret";

    fn token_for(sub: &str, exp: i64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_the_subject_user() {
        let auth = AuthConfig::from_secret(SECRET);
        let user_id = Uuid::now_v7();
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = token_for(&user_id.to_string(), exp);

        let user = verify_token(&auth, &token).unwrap();
        assert_eq!(user.user_id, user_id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthConfig::from_secret(SECRET);
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = token_for(&Uuid::now_v7().to_string(), exp);
        assert!(verify_token(&auth, &token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let auth = AuthConfig::from_secret(b"other-secret");
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = token_for(&Uuid::now_v7().to_string(), exp);
        assert!(verify_token(&auth, &token).is_err());
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let auth = AuthConfig::from_secret(SECRET);
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = token_for("alice", exp);
        assert!(verify_token(&auth, &token).is_err());
    }
}
