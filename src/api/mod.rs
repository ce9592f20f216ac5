mod auth;
mod error;
mod profile;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::ServerConfig;
use crate::challenge::CodeChallenges;
use crate::jwt::JwtConfig;
use crate::session::TokenService;

pub use error::{ApiError, validate_code, validate_email, validate_name};
pub use profile::UserProfile;

/// Create the API router. Routes are relative to the `/auth` mount point.
pub fn create_api_router(config: &ServerConfig) -> Router {
    let settings = &config.settings;
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret, settings.access_token_ttl));

    let challenges = CodeChallenges::new(
        config.db.clone(),
        config.clock.clone(),
        config.code_generator.clone(),
        settings.verify_code_ttl,
    );

    let tokens = TokenService::new(
        config.db.clone(),
        jwt.clone(),
        config.clock.clone(),
        settings.refresh_token_ttl,
    );

    let auth_state = auth::AuthState {
        db: config.db.clone(),
        clock: config.clock.clone(),
        challenges,
        tokens,
        notifier: config.notifier.clone(),
        rate_limits: config.rate_limits.clone(),
    };

    let profile_state = profile::ProfileState {
        db: config.db.clone(),
        jwt: jwt.clone(),
        clock: config.clock.clone(),
    };

    let users_state = users::UsersState {
        db: config.db.clone(),
        jwt,
        clock: config.clock.clone(),
    };

    Router::new()
        .merge(auth::router(auth_state))
        .merge(profile::router(profile_state))
        .merge(users::router(users_state))
}
