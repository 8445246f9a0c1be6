//! Aura service routes

use axum::{
    Extension, Form, Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::error::RegistryError;
use minijinja::context;
use serde::Deserialize;
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    controller::ChatReply,
    error::{ApiError, ApiResult},
    middleware::{
        CurrentUser, SESSION_COOKIE, current_identity, require_page_session, require_session,
    },
    mood::{FrameError, MoodReading, decode_frame},
    state::AppState,
    validation::{CREDENTIALS_REQUIRED, validate_credentials},
};

const INVALID_CREDENTIALS: &str = "Invalid username or password.";
const TOO_MANY_ATTEMPTS: &str = "Too many login attempts. Please try again later.";
const REGISTRATION_REQUIRED: &str = "Username and password are required for registration.";
const USERNAME_TAKEN: &str = "Username already exists. Please choose another.";

/// Login and registration form
#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /process_video`
#[derive(Deserialize)]
pub struct ProcessVideoRequest {
    pub image: Option<String>,
}

/// Body of `POST /chat_message`
#[derive(Deserialize)]
pub struct ChatMessageRequest {
    pub message: Option<String>,
    pub mood: Option<String>,
}

/// Create the router for the Aura service
pub fn create_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let pages = Router::new()
        .route("/chat", get(chat_page))
        .route("/dashboard", get(dashboard_page))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_page_session,
        ));

    let api = Router::new()
        .route("/process_video", post(process_video))
        .route("/chat_message", post(chat_message))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(index))
        .route("/login", get(login_form).post(login))
        .route("/register", post(register))
        .route("/logout", get(logout))
        .merge(pages)
        .merge(api)
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "aura",
        "chat_available": state.controller.is_available(),
    }))
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    match current_identity(&state, &headers).await {
        Some(_) => Redirect::to("/chat"),
        None => Redirect::to("/login"),
    }
}

fn login_page(
    state: &AppState,
    status: StatusCode,
    error: Option<&str>,
    is_register_error: bool,
) -> ApiResult<Response> {
    let page = state.pages.render(
        "login.html",
        context! { error => error, is_register_error => is_register_error },
    )?;
    Ok((status, page).into_response())
}

async fn login_form(State(state): State<AppState>) -> ApiResult<Response> {
    login_page(&state, StatusCode::OK, None, false)
}

/// Attach a fresh session cookie for `username`
fn start_session(state: &AppState, jar: CookieJar, username: &str) -> ApiResult<CookieJar> {
    let token = state.sessions.issue(username).map_err(|e| {
        error!("Failed to issue session for {}: {}", username, e);
        ApiError::InternalServerError
    })?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    Ok(jar.add(cookie))
}

/// User login endpoint
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> ApiResult<Response> {
    if let Err(message) = validate_credentials(&form.username, &form.password) {
        return login_page(&state, StatusCode::BAD_REQUEST, Some(message.as_str()), false);
    }

    if !state.rate_limiter.is_allowed(&form.username).await {
        warn!("Login rate limit hit for user: {}", form.username);
        return login_page(&state, StatusCode::TOO_MANY_REQUESTS, Some(TOO_MANY_ATTEMPTS), false);
    }

    if !state
        .registry
        .authenticate(&form.username, &form.password)
        .await?
    {
        info!("Failed login for user: {}", form.username);
        state.rate_limiter.record_failure(&form.username).await;
        return login_page(&state, StatusCode::UNAUTHORIZED, Some(INVALID_CREDENTIALS), false);
    }

    state.rate_limiter.reset(&form.username).await;
    let jar = start_session(&state, jar, &form.username)?;
    info!(
        "User logged in: {} (session valid for {}s)",
        form.username,
        state.sessions.ttl_seconds()
    );
    Ok((jar, Redirect::to("/chat")).into_response())
}

/// User registration endpoint; signs the new user in
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> ApiResult<Response> {
    if let Err(message) = validate_credentials(&form.username, &form.password) {
        let message = if message == CREDENTIALS_REQUIRED {
            REGISTRATION_REQUIRED.to_string()
        } else {
            message
        };
        return login_page(&state, StatusCode::BAD_REQUEST, Some(message.as_str()), true);
    }

    match state.registry.register(&form.username, &form.password).await {
        Ok(()) => {}
        Err(RegistryError::AlreadyExists) => {
            return login_page(&state, StatusCode::CONFLICT, Some(USERNAME_TAKEN), true);
        }
        Err(e) => return Err(e.into()),
    }

    let jar = start_session(&state, jar, &form.username)?;
    Ok((jar, Redirect::to("/chat")).into_response())
}

/// End the session and drop the cookie
async fn logout(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    if let Some(user) = current_identity(&state, &headers).await {
        if let Err(e) = state.sessions.revoke(&user.claims).await {
            warn!("Failed to revoke session for {}: {}", user.username, e);
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login")).into_response()
}

async fn chat_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Html<String>> {
    Ok(state
        .pages
        .render("chat.html", context! { username => user.username })?)
}

async fn dashboard_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Html<String>> {
    let identity = Some(user.username.as_str());
    let mood_history = state.store.read_moods(identity).await;
    let conversation = state.store.read_all(identity).await;

    Ok(state.pages.render(
        "dashboard.html",
        context! {
            username => user.username,
            mood_history => mood_history,
            conversation => conversation,
        },
    )?)
}

/// Infer the mood behind one webcam frame
async fn process_video(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<ProcessVideoRequest>, JsonRejection>,
) -> ApiResult<Json<MoodReading>> {
    let image = payload
        .ok()
        .and_then(|Json(body)| body.image)
        .filter(|image| !image.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image data".to_string()))?;

    let frame = match decode_frame(&image) {
        Ok(frame) => frame,
        Err(FrameError::Image(e)) => {
            warn!("Undecodable frame from {}: {}", user.username, e);
            return Err(ApiError::BadRequest("Could not decode image".to_string()));
        }
        Err(e) => {
            warn!("Error in mood detection: {}", e);
            return Ok(Json(MoodReading::neutral(e.to_string())));
        }
    };

    let reading = state.mood_gateway.detect(&frame).await;
    if let Err(e) = state
        .store
        .append_mood(Some(&user.username), reading.mood.as_str())
        .await
    {
        error!("Failed to save mood for {}: {}", user.username, e);
    }

    Ok(Json(reading))
}

/// One chat turn
async fn chat_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<ChatMessageRequest>, JsonRejection>,
) -> ApiResult<Json<ChatReply>> {
    let Json(body) = payload.map_err(|rejection| {
        warn!("Rejected chat message from {}: {}", user.username, rejection);
        ApiError::BadRequest(rejection.body_text())
    })?;
    let message = body.message.unwrap_or_default();
    let reply = state
        .controller
        .respond(Some(&user.username), body.mood.as_deref(), &message)
        .await?;
    Ok(Json(reply))
}
