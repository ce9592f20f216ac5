//! Verification code challenges.
//!
//! A challenge is a six-letter code bound to one user and one [`Action`],
//! valid for a short window and usable once. Consuming a code, or finding it
//! expired, removes every outstanding code of that user.

use std::sync::Arc;

use rand::Rng;

use crate::clock::Clock;
use crate::db::{Action, Database, User};

/// Number of letters in a verification code.
pub const CODE_LENGTH: usize = 6;

/// Source of verification codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform uppercase codes from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..CODE_LENGTH)
            .map(|_| rng.random_range(b'A'..=b'Z') as char)
            .collect()
    }
}

/// Always returns the same code. For tests and local development.
#[derive(Debug, Clone)]
pub struct FixedCodeGenerator(pub String);

impl CodeGenerator for FixedCodeGenerator {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// Check the code format: exactly six ASCII uppercase letters.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_uppercase())
}

/// Why a code could not be consumed.
#[derive(Debug)]
pub enum ConsumeError {
    /// No outstanding code matches the user, action and code.
    NoSuchCode,
    /// The code matched but its window has passed. All of the user's codes
    /// have been removed.
    Expired,
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ConsumeError {
    fn from(e: sqlx::Error) -> Self {
        ConsumeError::Database(e)
    }
}

impl std::fmt::Display for ConsumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumeError::NoSuchCode => write!(f, "No such verify code"),
            ConsumeError::Expired => write!(f, "Verify code expired"),
            ConsumeError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ConsumeError {}

/// Issues and consumes verification codes.
#[derive(Clone)]
pub struct CodeChallenges {
    db: Database,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn CodeGenerator>,
    ttl: i64,
}

impl CodeChallenges {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn CodeGenerator>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            db,
            clock,
            generator,
            ttl: ttl_secs,
        }
    }

    /// Generate and persist a new code for `user` and `action`.
    ///
    /// The caller is responsible for delivering the returned code. Earlier
    /// codes of the user are left in place.
    pub async fn issue(&self, user: &User, action: Action) -> Result<String, sqlx::Error> {
        let code = self.generator.generate();
        let expires_at = self.clock.now() + self.ttl;

        self.db
            .verify_codes()
            .create(&user.id, action, &code, expires_at)
            .await?;

        Ok(code)
    }

    /// Consume `code` for `user` and `action`.
    ///
    /// Succeeds at most once per issued code.
    pub async fn consume(
        &self,
        user: &User,
        action: Action,
        code: &str,
    ) -> Result<(), ConsumeError> {
        let taken = self
            .db
            .verify_codes()
            .take(&user.id, action, code)
            .await?
            .ok_or(ConsumeError::NoSuchCode)?;

        if taken.expires_at <= self.clock.now() {
            return Err(ConsumeError::Expired);
        }

        Ok(())
    }

    /// Remove every outstanding code of `user`.
    pub async fn clear(&self, user: &User) -> Result<u64, sqlx::Error> {
        self.db.verify_codes().delete_all_for_user(&user.id).await
    }
}
