use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use lambda_http::http::HeaderMap;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Name of the HTTP-only cookie carrying the session token.
pub const COOKIE_NAME: &str = "token";

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid signing key: {0}")]
    Key(String),

    #[error("Failed to sign token: {0}")]
    Sign(String),

    #[error("Invalid token")]
    Invalid,

    #[error("Token expired")]
    Expired,

    #[error("Token lifetime out of range: {0} days")]
    Lifetime(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 session tokens. Stateless: nothing is
/// recorded server-side, every request is verified on its own.
#[derive(Clone)]
pub struct TokenService {
    key: HmacSha256,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_days: i64) -> Result<Self, TokenError> {
        let key = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| TokenError::Key(e.to_string()))?;
        Ok(Self {
            key,
            ttl: Duration::try_days(ttl_days).ok_or(TokenError::Lifetime(ttl_days))?,
        })
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    pub(crate) fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::Lifetime(self.ttl.num_days()))?;
        let claims = TokenClaims {
            id: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        claims
            .sign_with_key(&self.key)
            .map_err(|e| TokenError::Sign(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims: TokenClaims = token.verify_with_key(&self.key).map_err(|e| {
            tracing::debug!("Token failed to verify: {}", e);
            TokenError::Invalid
        })?;

        if claims.exp <= Utc::now().timestamp() {
            tracing::debug!("Token for {} expired at {}", claims.id, claims.exp);
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str, secure: bool) -> String {
        format_cookie(token, self.ttl_seconds(), secure)
    }
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clearing_cookie(secure: bool) -> String {
    format_cookie("", 0, secure)
}

fn format_cookie(value: &str, max_age: i64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict{}",
        COOKIE_NAME, value, max_age, secure_flag
    )
}

/// Pull the session token out of the `Cookie` header, falling back to an
/// `Authorization: Bearer` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all("Cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
