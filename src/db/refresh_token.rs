//! Refresh token storage.
//!
//! Only refresh tokens are stored. Access tokens are stateless and short-lived.

use sqlx::sqlite::SqlitePool;

/// A stored refresh token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
}

/// Store for refresh tokens.
#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new refresh token for a user.
    pub async fn create(
        &self,
        user_id: &str,
        token: &str,
        expires_at: i64,
    ) -> Result<RefreshToken, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO refresh_tokens (id, user_id, token, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok(RefreshToken {
            id,
            user_id: user_id.to_string(),
            token: token.to_string(),
            expires_at,
        })
    }

    /// Look up a token without consuming it.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token, expires_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Atomically delete a token and return the deleted row.
    ///
    /// Of two concurrent callers presenting the same token, at most one
    /// receives `Some`.
    pub async fn take(&self, token: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "DELETE FROM refresh_tokens WHERE token = ? RETURNING id, user_id, token, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a token (logout). Returns whether it existed.
    pub async fn delete(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all tokens that expired at or before `now`.
    pub async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
