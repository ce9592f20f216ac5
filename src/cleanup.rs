//! Scheduled cleanup of expired credentials.

use crate::clock::Clock;
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database, clock: &dyn Clock, rate_limits: &RateLimitConfig) {
    let now = clock.now();

    // Verification codes that were never submitted
    match db.verify_codes().delete_expired(now).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired verify codes", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up verify codes: {}", e),
    }

    // Refresh tokens that were never presented again
    match db.refresh_tokens().delete_expired(now).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up refresh tokens: {}", e),
    }

    // Rate limiter entries for addresses that have gone quiet
    rate_limits.retain_recent();
    debug!(
        tracked = rate_limits.tracked_addresses(),
        "Pruned rate limiter state"
    );
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(
    db: Database,
    clock: Arc<dyn Clock>,
    rate_limits: RateLimitConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db, clock.as_ref(), &rate_limits).await;
        }
    })
}
