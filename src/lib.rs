pub mod api;
pub mod auth;
pub mod challenge;
pub mod cleanup;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;
pub mod notify;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use axum::Router;
use challenge::CodeGenerator;
use clock::Clock;
use db::Database;
use notify::NotificationSink;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Lifetimes of the credentials the service hands out, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    pub access_token_ttl: i64,
    pub refresh_token_ttl: i64,
    pub verify_code_ttl: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_token_ttl: 5 * 60,
            refresh_token_ttl: 30 * 24 * 60 * 60,
            verify_code_ttl: 5 * 60,
        }
    }
}

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing access tokens
    pub jwt_secret: Vec<u8>,
    pub settings: AuthSettings,
    /// Time source for every expiry decision
    pub clock: Arc<dyn Clock>,
    pub code_generator: Arc<dyn CodeGenerator>,
    /// Where verification codes are delivered
    pub notifier: Arc<dyn NotificationSink>,
    pub rate_limits: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    Router::new().nest("/auth", create_api_router(config))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(config: &ServerConfig) {
    cleanup::run_cleanup(&config.db, config.clock.as_ref(), &config.rate_limits).await;
    cleanup::spawn_cleanup_scheduler(
        config.db.clone(),
        config.clock.clone(),
        config.rate_limits.clone(),
    );
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
