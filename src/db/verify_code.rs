//! Verification code storage.
//!
//! Codes are never updated. They are removed when consumed, when found
//! expired, or by the periodic sweep.

use sqlx::sqlite::SqlitePool;

/// The flow a code was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Register,
    Login,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::Login => "login",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct VerifyCode {
    pub id: String,
    pub user_id: String,
    pub action: Action,
    pub code: String,
    pub expires_at: i64,
}

/// A code removed by [`VerifyCodeStore::take`].
#[derive(Debug, Clone, Copy)]
pub struct TakenCode {
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct VerifyCodeStore {
    pool: SqlitePool,
}

impl VerifyCodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a freshly issued code.
    pub async fn create(
        &self,
        user_id: &str,
        action: Action,
        code: &str,
        expires_at: i64,
    ) -> Result<VerifyCode, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO verify_codes (id, user_id, action, code, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(action.as_str())
        .bind(code)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(VerifyCode {
            id,
            user_id: user_id.to_string(),
            action,
            code: code.to_string(),
            expires_at,
        })
    }

    /// Atomically remove the code matching `(user_id, action, code)`.
    ///
    /// If a match exists, every other outstanding code of the user is removed
    /// in the same transaction. Returns `None` when nothing matched, in which
    /// case nothing is removed. Of two concurrent callers with the same code at
    /// most one gets `Some`.
    pub async fn take(
        &self,
        user_id: &str,
        action: Action,
        code: &str,
    ) -> Result<Option<TakenCode>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let matched: Vec<(i64,)> = sqlx::query_as(
            "DELETE FROM verify_codes WHERE user_id = ? AND action = ? AND code = ? RETURNING expires_at",
        )
        .bind(user_id)
        .bind(action.as_str())
        .bind(code)
        .fetch_all(&mut *tx)
        .await?;

        // The same code can in principle be issued twice; the latest wins.
        let Some(expires_at) = matched.into_iter().map(|(e,)| e).max() else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM verify_codes WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(TakenCode { expires_at }))
    }

    /// Remove every outstanding code of a user.
    pub async fn delete_all_for_user(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM verify_codes WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove all codes that expired at or before `now`.
    pub async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM verify_codes WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of outstanding codes for a user.
    pub async fn count_for_user(&self, user_id: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM verify_codes WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
