/// Authentication endpoints
///
/// - `POST /v1/auth/register` - Create an account (starts as `visitor`)
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for an access token
/// - `POST /v1/auth/logout` - Clear the session cookie
///
/// Register and login return the tokens in the body and also set the
/// `regen_session` cookie, so browser clients need not store the access
/// token themselves.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    Json,
};
use regen_shared::{
    access::SessionUser,
    auth::{
        jwt::{self, Claims, TokenType},
        middleware::SESSION_COOKIE,
        password,
    },
    models::user::{CreateUser, User},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked against the password strength rules
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Tokens plus the session user, returned by register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: SessionUser,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

type CookieHeader = [(header::HeaderName, String); 1];

/// `Set-Cookie` value carrying the access token
pub fn session_cookie(token: &str, secure: bool) -> String {
    let max_age = TokenType::Access.default_expiration().num_seconds();
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn expired_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<(CookieHeader, Json<AuthResponse>)> {
    let access_token = jwt::create_token(&Claims::new(user.id, TokenType::Access), state.jwt_secret())?;
    let refresh_token = jwt::create_token(&Claims::new(user.id, TokenType::Refresh), state.jwt_secret())?;

    let cookie = session_cookie(&access_token, state.config.api.production);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user: user.to_session_user(),
            access_token,
            refresh_token,
        }),
    ))
}

/// Register a new account
///
/// New accounts get the lowest role (`visitor`); they move up by
/// subscribing or by claiming an enterprise.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed or weak password
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieHeader, Json<AuthResponse>)> {
    req.validate()?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid_field("password", e.to_string()))?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "Registered new account");

    let (cookie, body) = issue_tokens(&state, &user)?;
    Ok((StatusCode::CREATED, cookie, body))
}

/// Login with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: Account suspended or deactivated
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieHeader, Json<AuthResponse>)> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
    }

    // Checked after the password so account state isn't disclosed to guessers
    if !user.is_active() {
        return Err(ApiError::Forbidden("Account is not active".to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    issue_tokens(&state, &user)
}

/// Exchange a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token, or unknown account
/// - `403 Forbidden`: Account suspended or deactivated
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<(CookieHeader, Json<RefreshResponse>)> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account not found".to_string()))?;

    if !user.is_active() {
        return Err(ApiError::Forbidden("Account is not active".to_string()));
    }

    let access_token = jwt::create_token(&Claims::new(user.id, TokenType::Access), state.jwt_secret())?;
    let cookie = session_cookie(&access_token, state.config.api.production);

    Ok(([(header::SET_COOKIE, cookie)], Json(RefreshResponse { access_token })))
}

/// Clear the session cookie
///
/// Tokens are stateless, so this only affects cookie-based clients.
pub async fn logout(State(state): State<AppState>) -> (StatusCode, CookieHeader) {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, expired_session_cookie(state.config.api.production))],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc", false);
        assert!(cookie.starts_with("regen_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));

        assert!(session_cookie("abc", true).ends_with("; Secure"));
    }

    #[test]
    fn test_expired_cookie_clears_value() {
        let cookie = expired_session_cookie(false);
        assert!(cookie.starts_with("regen_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
