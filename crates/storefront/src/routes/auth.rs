//! Authentication route handlers.
//!
//! Session tokens travel in `HttpOnly` cookies: signup and login set both,
//! refresh replaces the access token, logout removes both.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::session::cookies;
use crate::models::{TokenPair, UserProfile};
use crate::services::tokens::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
use crate::state::AppState;

use super::JsonBody;

// =============================================================================
// Request Types
// =============================================================================

/// Signup request body.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Forgot password request body.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset password request body.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

// =============================================================================
// Cookies
// =============================================================================

fn session_cookie(
    name: &'static str,
    value: String,
    ttl: std::time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX))
        .build()
}

fn with_session_cookies(jar: CookieJar, tokens: TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        cookies::ACCESS_TOKEN,
        tokens.access_token,
        ACCESS_TOKEN_TTL,
        secure,
    ))
    .add(session_cookie(
        cookies::REFRESH_TOKEN,
        tokens.refresh_token,
        REFRESH_TOKEN_TTL,
        secure,
    ))
}

fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(cookies::ACCESS_TOKEN).path("/"))
        .remove(Cookie::build(cookies::REFRESH_TOKEN).path("/"))
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new customer.
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<SignupRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state
        .auth()
        .signup(&body.email, &body.password, &body.name)
        .await?;

    set_sentry_user(&outcome.profile.id, Some(outcome.profile.email.as_str()));
    let jar = with_session_cookies(jar, outcome.tokens, state.config().secure_cookies());
    Ok((StatusCode::CREATED, jar, Json(outcome.profile)))
}

/// Log in with email and password.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<UserProfile>)> {
    let outcome = state.auth().login(&body.email, &body.password).await?;

    set_sentry_user(&outcome.profile.id, Some(outcome.profile.email.as_str()));
    let jar = with_session_cookies(jar, outcome.tokens, state.config().secure_cookies());
    Ok((jar, Json(outcome.profile)))
}

/// End the session and clear both cookies.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>)> {
    let refresh_token = jar.get(cookies::REFRESH_TOKEN).map(Cookie::value);
    state.auth().logout(refresh_token).await?;

    clear_sentry_user();
    Ok((
        without_session_cookies(jar),
        Json(json!({ "message": "Logged out successfully" })),
    ))
}

/// Mint a new access token from the refresh token cookie.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>)> {
    let refresh_token = jar.get(cookies::REFRESH_TOKEN).map(Cookie::value);
    let outcome = state.auth().refresh(refresh_token).await?;

    let cookie = session_cookie(
        cookies::ACCESS_TOKEN,
        outcome.access_token,
        ACCESS_TOKEN_TTL,
        state.config().secure_cookies(),
    );
    Ok((
        jar.add(cookie),
        Json(json!({ "message": "Token refreshed successfully" })),
    ))
}

/// The signed-in user's profile.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.auth().profile(user.id).await?))
}

/// Email a password reset link.
///
/// The response is the same whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    state.auth().forgot_password(&body.email).await?;

    Ok(Json(json!({
        "message": "If an account exists for that email, a password reset link has been sent"
    })))
}

/// Set a new password with a reset token.
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    state
        .auth()
        .reset_password(&body.token, &body.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password reset successfully" })))
}
