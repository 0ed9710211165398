//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account (first account becomes admin)
//! - POST /api/v1/auth/login - Log in, rate limited per IP and per email
//! - POST /api/v1/auth/forgot-password - Mail a reset link
//! - POST /api/v1/auth/reset-password - Set a new password from a reset link
//! - GET /api/v1/auth/session - Current session or null
//! - POST /api/v1/auth/logout - Log out
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/password - Change password while logged in

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{
    extract_session_token, ApiError, AppState, AuthenticatedUser, OptionalUser,
};
use crate::api::responses::{AuthResponse, MessageResponse, SessionResponse, UserResponse};
use crate::services::{RegisterInput, UserServiceError};

const SESSION_COOKIE_MAX_AGE: i64 = 7 * 24 * 60 * 60;

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
    /// Where the reset link should point; ignored unless it shares the
    /// configured origin
    #[serde(default)]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub password_confirmation: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Build auth routes that read the session if there is one
pub fn optional_router() -> Router<AppState> {
    Router::new().route("/session", get(current_session))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/password", put(change_password))
}

/// Extract client IP address from proxy headers
fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip) = value.split(',').next() {
                return Some(ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.trim().to_string());
        }
    }

    None
}

fn session_cookie(token: &str) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, SESSION_COOKIE_MAX_AGE
    );
    let value = HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state
        .user_service
        .register(RegisterInput {
            email: body.email,
            password: body.password,
            display_name: body.display_name,
        })
        .await?;

    let session = state.user_service.login(&user.email, &password).await?;
    let headers = session_cookie(&session.id)?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = body.email.trim().to_lowercase();

    if let Some(ip) = extract_ip_address(&headers).and_then(|s| s.parse().ok()) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rejected, IP rate limit exceeded");
            return Err(ApiError::rate_limited(
                "Too many requests. Please try again later.",
                60,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_email_limited(&email).await {
        tracing::warn!(email = %email, "Login rejected, too many failed attempts");
        return Err(ApiError::rate_limited(
            "Too many failed login attempts. Please try again in 15 minutes.",
            900,
        ));
    }

    let session = match state.user_service.login(&email, &body.password).await {
        Ok(session) => session,
        Err(e) => {
            if matches!(e, UserServiceError::AuthenticationError(_)) {
                state.rate_limiter.record_failed_attempt(&email).await;
            }
            return Err(e.into());
        }
    };

    let user = state
        .user_service
        .validate_session(&session.id)
        .await?
        .ok_or_else(|| ApiError::internal_error("Session validation failed"))?;

    state.rate_limiter.clear_email_attempts(&email).await;
    tracing::info!(user_id = user.id, "User logged in");

    let response_headers = session_cookie(&session.id)?;
    Ok((
        response_headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/forgot-password
///
/// Answers the same way whether or not the address has an account.
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .request_password_reset(&body.email, body.redirect_to.as_deref())
        .await?;

    Ok(Json(MessageResponse::new(
        "If an account exists for this address, a reset link is on its way.",
    )))
}

/// POST /api/v1/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .reset_password(&body.token, &body.password, &body.password_confirmation)
        .await?;

    Ok(Json(MessageResponse::new(
        "Your password has been updated. Please log in.",
    )))
}

/// GET /api/v1/auth/session
async fn current_session(user: OptionalUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: user.0.is_some(),
        user: user.0.map(UserResponse::from),
    })
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state.user_service.logout(&token).await?;

    let clear_cookie = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, HeaderValue::from_static(clear_cookie));

    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/password
///
/// Other sessions of the user are signed out.
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(&user.0, &body.password, &body.password_confirmation)
        .await?;

    Ok(Json(MessageResponse::new("Password changed")))
}
