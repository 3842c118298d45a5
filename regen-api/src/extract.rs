/// Extractors for the signed-in user
///
/// The auth middleware only proves who the caller is. Roles and account
/// status are read from the database on every request so an admin role
/// change or a suspension takes effect immediately, without waiting for
/// tokens to expire.
///
/// - [`CurrentUser`]: requires an active account (401/403 otherwise)
/// - [`MaybeUser`]: `None` for anonymous callers and inactive accounts

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use regen_shared::{
    access::SessionUser,
    auth::middleware::{AuthContext, AuthError},
    models::user::User,
};
use uuid::Uuid;

use crate::{app::AppState, error::ApiError};

/// The authenticated, active user making the request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Session view of the user, as the role predicates expect it
    pub fn session(&self) -> SessionUser {
        self.0.to_session_user()
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

/// The caller if signed in with an active account
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn session(&self) -> Option<SessionUser> {
        self.0.as_ref().map(User::to_session_user)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)?;

        let user = User::find_by_id(&state.db, auth.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Account not found".to_string()))?;

        if !user.is_active() {
            return Err(ApiError::Forbidden("Account is not active".to_string()));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(auth) = parts.extensions.get::<AuthContext>().copied() else {
            return Ok(MaybeUser(None));
        };

        let user = User::find_by_id(&state.db, auth.user_id)
            .await?
            .filter(User::is_active);

        Ok(MaybeUser(user))
    }
}
