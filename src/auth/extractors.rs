//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, error};

use super::bearer::{authorization_header, parse_bearer};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::db::{Database, User};
use crate::jwt::JwtConfig;

/// Resolve an `Authorization` header value to an active user.
///
/// Missing, malformed, badly signed or expired credentials and unknown or
/// inactive subjects all yield `Ok(None)`. Only repository failures are errors.
pub async fn authenticate(
    authorization: Option<&str>,
    jwt: &JwtConfig,
    db: &Database,
    now: i64,
) -> Result<Option<User>, sqlx::Error> {
    let Some(token) = authorization.and_then(parse_bearer) else {
        return Ok(None);
    };

    let claims = match jwt.validate_access_token(token, now) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Rejected access token");
            return Ok(None);
        }
    };

    let user = db.users().get_by_id(&claims.sub).await?;
    Ok(user.filter(|u| u.is_active))
}

/// Shared by the extractors: resolve the request's bearer token.
async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<Option<User>, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let now = state.clock().now();

    authenticate(
        authorization_header(&parts.headers),
        state.jwt(),
        state.db(),
        now,
    )
    .await
    .map_err(|e| {
        error!("Failed to resolve user for token: {}", e);
        AuthErrorKind::DatabaseError
    })
}

/// Extractor for endpoints that require an authenticated, active user.
pub struct Auth(pub User);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map_err(ApiAuthError::new)?
            .map(Auth)
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::NotAuthenticated))
    }
}

/// Optional authentication: anonymous requests get `None`.
///
/// Repository failures are still reported as errors.
pub struct MaybeAuth(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(MaybeAuth)
            .map_err(ApiAuthError::new)
    }
}

/// Extractor for endpoints restricted to superusers.
///
/// Anonymous requests get 401, authenticated non-superusers get 403.
pub struct SuperuserAuth(pub User);

impl<S> FromRequestParts<S> for SuperuserAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_superuser {
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }
        Ok(SuperuserAuth(user))
    }
}
