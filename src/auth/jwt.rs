use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "token";

/// JWT payload: the session token is `{sub, iat, exp}` plus the signature,
/// nothing is kept server-side.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid, // user ID
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
}

/// Signing and verification keys plus the configured session TTL.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::minutes(config.ttl_minutes),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a signed session token for `user_id`, expiring `ttl` from `now`.
    pub fn sign(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: (now + self.ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    /// Rejects tampered signatures and expired tokens. Expiry is checked
    /// against the caller-supplied instant, same as reset-token expiry.
    pub fn verify(&self, token: &str, now: OffsetDateTime) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if now.unix_timestamp() > data.claims.exp as i64 {
            anyhow::bail!("session token expired");
        }
        Ok(data.claims)
    }
}

/// Cookie carrying the session token: HttpOnly, lifetime matching the JWT.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.whole_seconds()
    )
}

/// Already-expired replacement cookie; logout is purely a client-side
/// discard, the token itself stays valid until natural expiry.
pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

fn token_from_parts(parts: &Parts) -> Option<String> {
    // Session cookie first, Bearer header as a fallback.
    if let Some(cookies) = parts
        .headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
    {
        for pair in cookies.split(';') {
            if let Some(value) = pair.trim().strip_prefix("token=") {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

/// Extracts and validates the session token, yielding the user ID.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or((
            StatusCode::UNAUTHORIZED,
            "Please login to access this resource".to_string(),
        ))?;

        match state.auth.verify_session(&token) {
            Ok(user_id) => Ok(AuthUser(user_id)),
            Err(_) => {
                warn!("invalid or expired session token");
                Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ))
            }
        }
    }
}
