use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use sqlx::PgPool;

/// Verification material for incoming bearer tokens. The identity provider
/// signs them; this service only validates.
#[derive(Clone)]
pub struct AuthConfig {
    pub decoding_key: DecodingKey,
    pub validation: Validation,
}

impl AuthConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_env() -> Result<Self, String> {
        let secret = std::env::var("VITALOG_AUTH_SECRET")
            .map_err(|_| "VITALOG_AUTH_SECRET must be set".to_string())?;
        if secret.trim().is_empty() {
            return Err("VITALOG_AUTH_SECRET must not be empty".to_string());
        }
        Ok(Self::from_secret(secret.as_bytes()))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub auth: AuthConfig,
}
