//! CLI argument parsing, validation, and startup helpers.

use crate::challenge::RandomCodeGenerator;
use crate::clock::SystemClock;
use crate::db::Database;
use crate::notify::{LogSink, NotificationSink, WebhookSink};
use crate::rate_limit::RateLimitConfig;
use crate::{AuthSettings, ServerConfig};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mailgate",
    about = "Passwordless accounts with e-mailed verification codes"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7292")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "mailgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// POST verification e-mails as JSON to this URL instead of logging them
    #[arg(long, env = "MAILGATE_NOTIFY_WEBHOOK")]
    pub notify_webhook: Option<String>,

    /// Include verification codes in the log. For local development only
    #[arg(long)]
    pub log_codes: bool,

    /// Grant superuser to an existing account on startup
    #[arg(long, value_name = "EMAIL")]
    pub promote_superuser: Option<String>,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Pick the notification sink from the arguments.
/// Returns None and logs an error if the webhook URL is invalid.
pub fn build_notifier(
    notify_webhook: Option<&str>,
    log_codes: bool,
) -> Option<Arc<dyn NotificationSink>> {
    let Some(raw) = notify_webhook else {
        if log_codes {
            warn!("Verification codes will be written to the log");
        }
        return Some(Arc::new(LogSink {
            reveal_codes: log_codes,
        }));
    };

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %raw, error = %e, "Invalid notify-webhook URL");
            return None;
        }
    };

    if url.scheme() != "https" && url.host_str() != Some("localhost") {
        error!("notify-webhook must use HTTPS for non-localhost deployments");
        return None;
    }

    let sink = match WebhookSink::new(url.clone()) {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "Failed to build notify-webhook client");
            return None;
        }
    };

    info!(url = %url, "Delivering verification codes via webhook");
    Some(Arc::new(sink))
}

/// Handle the --promote-superuser flag.
pub async fn handle_promote_superuser(db: &Database, email: &str) {
    match db.users().set_superuser(email, true).await {
        Ok(true) => info!(email = %email, "Granted superuser"),
        Ok(false) => {
            error!(email = %email, "No user with this email, register first");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Failed to grant superuser");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    jwt_secret: String,
    notifier: Arc<dyn NotificationSink>,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        settings: AuthSettings::default(),
        clock: Arc::new(SystemClock),
        code_generator: Arc::new(RandomCodeGenerator),
        notifier,
        rate_limits: RateLimitConfig::new(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["mailgate"]);
        assert_eq!(args.port, 7292);
        assert_eq!(args.database, "mailgate.db");
        assert!(!args.log_codes);
        assert!(args.promote_superuser.is_none());
    }

    #[test]
    fn test_args_flags() {
        let args = Args::parse_from([
            "mailgate",
            "--port",
            "8000",
            "--log-format",
            "json",
            "--log-codes",
            "--promote-superuser",
            "root@example.com",
        ]);
        assert_eq!(args.port, 8000);
        assert!(matches!(args.log_format, LogFormat::Json));
        assert!(args.log_codes);
        assert_eq!(args.promote_superuser.as_deref(), Some("root@example.com"));
    }

    #[test]
    fn test_webhook_url_checked() {
        assert!(build_notifier(None, false).is_some());
        assert!(build_notifier(Some("https://mail.example.com/send"), false).is_some());
        assert!(build_notifier(Some("http://localhost:8025/send"), false).is_some());
        assert!(build_notifier(Some("http://mail.example.com/send"), false).is_none());
        assert!(build_notifier(Some("not a url"), false).is_none());
    }
}
