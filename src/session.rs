//! Session issuance and refresh token rotation.
//!
//! A session is an access/refresh pair. Access tokens are signed JWTs that
//! are never stored; refresh tokens are opaque random strings stored with an
//! expiry and replaced on every use.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;

use crate::clock::Clock;
use crate::db::{Database, RefreshToken, User};
use crate::jwt::{AccessTokenResult, JwtConfig, JwtError};

/// Bytes of randomness in a refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

/// Errors while minting a session.
#[derive(Debug)]
pub enum SessionError {
    Jwt(JwtError),
    Database(sqlx::Error),
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        SessionError::Jwt(e)
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Database(e)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Jwt(e) => write!(f, "{}", e),
            SessionError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

/// Why a refresh token could not be rotated.
#[derive(Debug)]
pub enum RotateError {
    /// Unknown token, or one that was already used.
    NoSuchToken,
    /// The token existed but had expired. It has been deleted.
    Expired,
    /// The owner is gone or not active. The token has been deleted.
    InactiveUser,
    Session(SessionError),
}

impl From<SessionError> for RotateError {
    fn from(e: SessionError) -> Self {
        RotateError::Session(e)
    }
}

impl From<sqlx::Error> for RotateError {
    fn from(e: sqlx::Error) -> Self {
        RotateError::Session(SessionError::Database(e))
    }
}

impl std::fmt::Display for RotateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotateError::NoSuchToken => write!(f, "No token"),
            RotateError::Expired => write!(f, "Token expired"),
            RotateError::InactiveUser => write!(f, "No active user for token"),
            RotateError::Session(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RotateError {}

/// Generate an opaque, URL-safe refresh token.
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Mints access tokens and issues, rotates and revokes refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    db: Database,
    jwt: Arc<JwtConfig>,
    clock: Arc<dyn Clock>,
    refresh_ttl: i64,
}

impl TokenService {
    pub fn new(
        db: Database,
        jwt: Arc<JwtConfig>,
        clock: Arc<dyn Clock>,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            db,
            jwt,
            clock,
            refresh_ttl: refresh_ttl_secs,
        }
    }

    /// Sign a short-lived access token for `user`.
    pub fn mint_access_token(&self, user: &User) -> Result<AccessTokenResult, JwtError> {
        self.jwt.generate_access_token(&user.id, self.clock.now())
    }

    /// Generate and persist a refresh token for `user`.
    pub async fn mint_refresh_token(&self, user: &User) -> Result<RefreshToken, sqlx::Error> {
        let token = generate_refresh_secret();
        let expires_at = self.clock.now() + self.refresh_ttl;
        self.db
            .refresh_tokens()
            .create(&user.id, &token, expires_at)
            .await
    }

    /// Mint a new access/refresh pair for `user`.
    pub async fn issue_session(&self, user: &User) -> Result<Session, SessionError> {
        let access = self.mint_access_token(user)?;
        let refresh = self.mint_refresh_token(user).await?;

        Ok(Session {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    /// Exchange a refresh token for a new session.
    ///
    /// The presented token is deleted by the lookup itself, so it can never be
    /// used twice, even by concurrent requests.
    pub async fn rotate(&self, presented: &str) -> Result<Session, RotateError> {
        let stored = self
            .db
            .refresh_tokens()
            .take(presented)
            .await?
            .ok_or(RotateError::NoSuchToken)?;

        if stored.expires_at <= self.clock.now() {
            return Err(RotateError::Expired);
        }

        let user = self
            .db
            .users()
            .get_by_id(&stored.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(RotateError::InactiveUser)?;

        Ok(self.issue_session(&user).await?)
    }

    /// Delete a refresh token. Returns whether it existed.
    pub async fn revoke(&self, presented: &str) -> Result<bool, sqlx::Error> {
        self.db.refresh_tokens().delete(presented).await
    }
}
