//! Profile endpoints for the authenticated user.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt, validate_name};
use crate::auth::Auth;
use crate::clock::Clock;
use crate::db::{Database, ProfileUpdate, User};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct ProfileState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub clock: Arc<dyn Clock>,
}

impl_has_auth_backend!(ProfileState);

pub fn router(state: ProfileState) -> Router {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .with_state(state)
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            middle_name: user.middle_name,
            last_name: user.last_name,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
        }
    }
}

/// Absent and `null` fields are left unchanged.
#[derive(Deserialize)]
struct UpdateProfileRequest {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    middle_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

fn checked(field: &str, value: Option<&str>) -> Result<Option<String>, ApiError> {
    value
        .map(|v| validate_name(field, v).map(str::to_string))
        .transpose()
}

async fn get_me(Auth(user): Auth) -> impl IntoResponse {
    Json(UserProfile::from(user))
}

async fn update_me(
    State(state): State<ProfileState>,
    Auth(user): Auth,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = ProfileUpdate {
        first_name: checked("first_name", payload.first_name.as_deref())?,
        middle_name: checked("middle_name", payload.middle_name.as_deref())?,
        last_name: checked("last_name", payload.last_name.as_deref())?,
    };

    if update.is_empty() {
        return Ok(Json(UserProfile::from(user)));
    }

    let updated = state
        .db
        .users()
        .update_profile(&user.id, &update)
        .await
        .db_err("Failed to update profile")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserProfile::from(updated)))
}
