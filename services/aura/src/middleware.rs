//! Session middleware
//!
//! Resolves the current identity from the `session` cookie or an
//! `Authorization: Bearer` header. JSON endpoints answer 401 without one;
//! pages redirect to the login form.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};
use tracing::debug;

use crate::{error::ApiError, session::Claims, state::AppState};

pub const SESSION_COOKIE: &str = "session";

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub claims: Claims,
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(auth.token().to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// The authenticated identity behind a request, if any
pub async fn current_identity(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let token = session_token(headers)?;
    match state.sessions.validate(&token).await {
        Ok(claims) => Some(CurrentUser {
            username: claims.sub.clone(),
            claims,
        }),
        Err(e) => {
            debug!("Ignoring session token: {}", e);
            None
        }
    }
}

/// Reject unauthenticated requests to JSON endpoints
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_identity(&state, req.headers())
        .await
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Send unauthenticated page views to the login form
pub async fn require_page_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match current_identity(&state, req.headers()).await {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => Redirect::to("/login").into_response(),
    }
}
