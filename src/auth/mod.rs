//! Bearer token authentication.
//!
//! Requests carry a short-lived access token in `Authorization: Bearer`.
//! The token is stateless; only its subject is looked up, so deleting or
//! deactivating a user takes effect immediately.

mod bearer;
mod errors;
mod extractors;
mod state;

pub use bearer::{authorization_header, parse_bearer};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Auth, MaybeAuth, SuperuserAuth, authenticate};
pub use state::HasAuthBackend;
