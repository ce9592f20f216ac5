use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt, validate_code, validate_email, validate_name};
use crate::challenge::{CodeChallenges, ConsumeError};
use crate::clock::Clock;
use crate::db::{Action, Database, NewUser, User};
use crate::notify::{NotificationSink, dispatch};
use crate::rate_limit::RateLimitConfig;
use crate::session::{RotateError, TokenService};

const CODE_SENT: &str = "verify code sent on email";
const REGISTRATION_SUCCESS: &str = "Registration success";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub clock: Arc<dyn Clock>,
    pub challenges: CodeChallenges,
    pub tokens: TokenService,
    pub notifier: Arc<dyn NotificationSink>,
    pub rate_limits: RateLimitConfig,
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/verify_register", post(verify_register))
        .route("/login", post(login))
        .route("/verify_login", post(verify_login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    first_name: String,
    last_name: String,
    #[serde(default)]
    middle_name: Option<String>,
}

#[derive(Deserialize)]
struct EmailRequest {
    email: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    email: String,
    code: String,
}

#[derive(Deserialize)]
struct TokenRequest {
    token: String,
}

#[derive(Serialize)]
struct LogoutResponse {
    revoked: bool,
}

fn consume_error(e: ConsumeError) -> ApiError {
    match e {
        ConsumeError::NoSuchCode | ConsumeError::Expired => ApiError::bad_request(e.to_string()),
        ConsumeError::Database(e) => ApiError::db_error("Failed to consume verify code", e),
    }
}

fn rotate_error(e: RotateError) -> ApiError {
    match e {
        RotateError::NoSuchToken | RotateError::Expired | RotateError::InactiveUser => {
            ApiError::unauthorized(e.to_string())
        }
        RotateError::Session(e) => ApiError::db_error("Failed to issue session", e),
    }
}

impl AuthState {
    fn check_issue_limit(&self, email: &str) -> Result<(), ApiError> {
        if !self.rate_limits.allow_issue(email) {
            warn!(email = %email, "Code issue rate limit exceeded");
            return Err(ApiError::too_many_requests());
        }
        Ok(())
    }

    fn check_verify_limit(&self, email: &str) -> Result<(), ApiError> {
        if !self.rate_limits.allow_verify(email) {
            warn!(email = %email, "Code verify rate limit exceeded");
            return Err(ApiError::too_many_requests());
        }
        Ok(())
    }

    async fn find_user(&self, email: &str) -> Result<User, ApiError> {
        self.db
            .users()
            .get_by_email(email)
            .await
            .db_err("Failed to get user")?
            .ok_or_else(|| ApiError::bad_request("No such user"))
    }

    async fn send_code(&self, user: &User, action: Action) -> Result<(), ApiError> {
        let code = self
            .challenges
            .issue(user, action)
            .await
            .db_err("Failed to store verify code")?;

        dispatch(self.notifier.clone(), user.email.clone(), code, action);
        Ok(())
    }
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&payload.email)?;
    let first_name = validate_name("first_name", &payload.first_name)?;
    let last_name = validate_name("last_name", &payload.last_name)?;
    let middle_name = payload
        .middle_name
        .as_deref()
        .map(|m| validate_name("middle_name", m))
        .transpose()?;

    state.check_issue_limit(email)?;

    let new = NewUser {
        email: email.to_string(),
        first_name: first_name.to_string(),
        middle_name: middle_name.map(str::to_string),
        last_name: last_name.to_string(),
    };

    let user = state
        .db
        .users()
        .register_pending(&new, state.clock.now())
        .await
        .db_err("Failed to create user")?
        .ok_or_else(|| ApiError::conflict("User with this email already exists"))?;

    state.send_code(&user, Action::Register).await?;
    info!(user_id = %user.id, "Registration started");

    Ok(Json(StatusResponse { status: CODE_SENT }))
}

async fn verify_register(
    State(state): State<AuthState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&payload.email)?;
    validate_code(&payload.code)?;
    state.check_verify_limit(email)?;

    let user = state.find_user(email).await?;

    state
        .challenges
        .consume(&user, Action::Register, &payload.code)
        .await
        .map_err(consume_error)?;

    state
        .db
        .users()
        .activate(&user.id)
        .await
        .db_err("Failed to activate user")?;
    info!(user_id = %user.id, "Registration verified");

    Ok(Json(StatusResponse {
        status: REGISTRATION_SUCCESS,
    }))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&payload.email)?;
    state.check_issue_limit(email)?;

    let user = state.find_user(email).await?;
    if !user.is_active {
        return Err(ApiError::bad_request("No such user"));
    }

    state
        .challenges
        .clear(&user)
        .await
        .db_err("Failed to clear verify codes")?;
    state.send_code(&user, Action::Login).await?;

    Ok(Json(StatusResponse { status: CODE_SENT }))
}

async fn verify_login(
    State(state): State<AuthState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&payload.email)?;
    validate_code(&payload.code)?;
    state.check_verify_limit(email)?;

    let user = state.find_user(email).await?;
    if !user.is_active {
        return Err(ApiError::bad_request("No such user"));
    }

    state
        .challenges
        .consume(&user, Action::Login, &payload.code)
        .await
        .map_err(consume_error)?;

    let session = state
        .tokens
        .issue_session(&user)
        .await
        .db_err("Failed to issue session")?;
    info!(user_id = %user.id, "User logged in");

    Ok(Json(session))
}

async fn refresh(
    State(state): State<AuthState>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("No token"));
    }

    let session = state.tokens.rotate(token).await.map_err(rotate_error)?;
    Ok(Json(session))
}

async fn logout(
    State(state): State<AuthState>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .tokens
        .revoke(payload.token.trim())
        .await
        .db_err("Failed to revoke token")?;

    Ok(Json(LogoutResponse { revoked }))
}
