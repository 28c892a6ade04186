//! Authentication extractors.
//!
//! Requests authenticate with the short-lived access token, read from the
//! `accessToken` cookie or an `Authorization: Bearer` header. Verification
//! is stateless; the user record is loaded so a deleted account or a changed
//! role takes effect immediately.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::models::session::cookies;
use crate::state::AppState;

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires an authenticated admin.
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when a request is not allowed through.
#[derive(Debug)]
pub enum AuthRejection {
    /// No access token, or it did not verify.
    Unauthorized,
    /// Authenticated, but not an admin.
    Forbidden,
    /// Looking up the user failed.
    Upstream(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                AppError::Unauthorized("Unauthorized - no valid access token".to_string())
                    .into_response()
            }
            Self::Forbidden => {
                AppError::Forbidden("Access denied - admin only".to_string()).into_response()
            }
            Self::Upstream(err) => err.into_response(),
        }
    }
}

/// Pull the access token from the cookie, or failing that the bearer header.
fn access_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(cookies::ACCESS_TOKEN) {
        return Some(cookie.value().to_owned());
    }

    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token(parts).ok_or(AuthRejection::Unauthorized)?;

        let user_id = state
            .tokens()
            .verify_access_token(&token)
            .map_err(|_| AuthRejection::Unauthorized)?;

        let user = state
            .users()
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthRejection::Upstream(e.into()))?
            .ok_or(AuthRejection::Unauthorized)?;

        Ok(Self(CurrentUser {
            id: user.id,
            email: user.email,
            role: user.role,
        }))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            tracing::warn!(user_id = %user.id, "Non-admin attempted admin route");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: (&str, &str)) -> Parts {
        let (parts, ()) = Request::builder()
            .header(header.0, header.1)
            .body(())
            .unwrap_or_default()
            .into_parts();
        parts
    }

    #[test]
    fn test_token_from_cookie() {
        let p = parts(("cookie", "theme=dark; accessToken=abc.def.ghi"));
        assert_eq!(access_token(&p).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_token_from_bearer_header() {
        let p = parts(("authorization", "Bearer abc.def.ghi"));
        assert_eq!(access_token(&p).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_no_token() {
        let p = parts(("authorization", "Basic dXNlcjpwYXNz"));
        assert!(access_token(&p).is_none());
    }
}
