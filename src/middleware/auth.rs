//! Authentication middleware.
//!
//! Two kinds of callers are authenticated here:
//! - Devices, presenting the token issued on activation as
//!   `Authorization: Bearer <token>`
//! - Admins, presenting a session secret in the `admin_session` cookie
//!   (or as a bearer token, for scripts)
//!
//! On success the verified identity is inserted into the request
//! extensions; on failure the request is rejected with HTTP 401.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::AppError, services::admin_service, services::token_service::TokenError};

/// Cookie carrying the admin session secret.
pub const SESSION_COOKIE: &str = "admin_session";

/// Device token middleware.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>`
/// 2. Verify signature and expiry with the process-wide token issuer
/// 3. Inject the `DeviceClaims` into the request, call next handler
///
/// # Errors
///
/// - `TokenError::Missing`: no Authorization header or empty bearer value
/// - `TokenError::Expired`: token past its `exp`
/// - `TokenError::Invalid`: bad format or signature
pub async fn device_token_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(TokenError::Missing)?;

    let claims = state.tokens.verify(token)?;

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Admin session middleware.
///
/// Looks up the session secret from the cookie (falling back to a bearer
/// token) and injects an `AdminContext` for the handlers.
pub async fn admin_session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_cookie(request.headers())
        .or_else(|| bearer_token(request.headers()))
        .ok_or(AppError::AdminUnauthenticated)?
        .to_string();

    let admin = admin_service::authenticate_session(&state.pool, &token).await?;

    request.extensions_mut().insert(admin);

    Ok(next.run(request).await)
}

/// Value of `Authorization: Bearer <value>`, if present and non-empty.
///
/// A bare token without the `Bearer ` prefix is accepted too.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    (!token.is_empty()).then_some(token)
}

/// Value of the admin session cookie, if present.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value that stores a session secret.
pub fn session_cookie_header(token: &str, max_age_seconds: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_seconds
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie_header() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_prefix_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn raw_token_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn empty_bearer_counts_as_missing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; admin_session=s3cret; lang=en"),
        );
        assert_eq!(session_cookie(&headers), Some("s3cret"));
    }

    #[test]
    fn missing_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("admin_session="));
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn cookie_headers_are_http_only() {
        let set = session_cookie_header("abc", 3600);
        assert!(set.starts_with("admin_session=abc;"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Max-Age=3600"));
        assert!(clear_session_cookie_header().contains("Max-Age=0"));
    }
}
