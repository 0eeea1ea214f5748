use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

use crate::entities::user::UserRole;

pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("JWT configuration error: {0}")]
    Config(String),
}

fn jwt_secret() -> Result<String, JwtError> {
    env::var("JWT_SECRET").map_err(|_| JwtError::Config("JWT_SECRET not set".to_string()))
}

pub fn create_token(user_id: Uuid, email: &str, role: &UserRole) -> Result<String, JwtError> {
    let jwt_secret = jwt_secret()?;

    let now = Utc::now();
    let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(JwtError::Jwt)
}

pub fn validate_token(token: &str) -> Result<Claims, JwtError> {
    let jwt_secret = jwt_secret()?;

    let validation = Validation::default();

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(JwtError::Jwt)?;

    Ok(token_data.claims)
}
