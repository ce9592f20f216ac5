//! User administration endpoints.
//!
//! All endpoints require a superuser.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use super::profile::UserProfile;
use crate::auth::SuperuserAuth;
use crate::clock::Clock;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub clock: Arc<dyn Clock>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", delete(delete_user))
        .with_state(state)
}

/// List all active users.
async fn list_users(
    State(state): State<UsersState>,
    _auth: SuperuserAuth,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list_active()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(
        users
            .into_iter()
            .map(UserProfile::from)
            .collect::<Vec<_>>(),
    ))
}

async fn delete_user(
    State(state): State<UsersState>,
    SuperuserAuth(admin): SuperuserAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let deleted = state
        .db
        .users()
        .delete(&id)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(admin_id = %admin.id, user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
