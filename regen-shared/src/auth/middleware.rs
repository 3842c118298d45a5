/// Session authentication middleware for Axum
///
/// Credentials are read from, in order:
///
/// 1. `Authorization: Bearer <jwt>`
/// 2. the `regen_session=<jwt>` cookie
///
/// Two middleware flavours are provided:
///
/// - [`jwt_auth_middleware`] rejects requests without a valid access token
/// - [`optional_jwt_middleware`] lets them through anonymously; a present but
///   invalid token is still rejected so a stale cookie never silently
///   downgrades a signed-in user to a visitor
///
/// On success an [`AuthContext`] is inserted into the request extensions,
/// from where handlers extract it directly (it implements
/// `FromRequestParts`), or as `Option<AuthContext>` on optional routes.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use regen_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
///
/// async fn whoami(auth: AuthContext) -> String {
///     auth.user_id.to_string()
/// }
///
/// let secret = "test-secret-key-at-least-32-bytes-long".to_string();
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn(move |req, next| {
///         jwt_auth_middleware(secret.clone(), req, next)
///     }));
/// ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "regen_session";

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Error type for authentication middleware
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer header and no session cookie
    #[error("Missing credentials")]
    MissingCredentials,

    /// Authorization header present but not a bearer token
    #[error("{0}")]
    InvalidFormat(String),

    /// Token validation failed
    #[error("{0}")]
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        };

        let body = Json(json!({
            "error": "unauthorized",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Reads the session cookie value out of a `Cookie` header
fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Extracts the raw session token from the request headers
///
/// Returns `Ok(None)` when neither a bearer header nor a session cookie is
/// present.
///
/// # Errors
///
/// Returns `AuthError::InvalidFormat` when an `Authorization` header is
/// present but is not a bearer token
pub fn extract_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidFormat("Authorization header is not ASCII".to_string()))?;

        return value
            .strip_prefix("Bearer ")
            .map(|t| Some(t.trim()))
            .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()));
    }

    Ok(session_cookie(headers))
}

/// Validates an access token and builds the auth context
pub fn authenticate(token: &str, secret: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
    })?;

    Ok(AuthContext::new(claims.sub))
}

/// Requires a valid access token
///
/// # Errors
///
/// - 401 if no credentials are present, or the token is invalid or expired
/// - 400 if the `Authorization` header is malformed
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(req.headers())?.ok_or(AuthError::MissingCredentials)?;
    let auth = authenticate(token, &secret)?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Authenticates when credentials are present, passes through otherwise
pub async fn optional_jwt_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(token) = extract_token(req.headers())? {
        let auth = authenticate(token, &secret)?;
        req.extensions_mut().insert(auth);
    }

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}
