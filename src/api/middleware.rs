//! API middleware
//!
//! Contains middleware for:
//! - Authentication (session token from Bearer header or `session` cookie)
//! - Authorization (admin role)
//! - Request statistics reported by the health endpoint
//!
//! Also holds the shared [`AppState`] and the [`ApiError`] response type.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::create_cache;
use crate::config::{Config, StorageConfig};
use crate::db::repositories::{
    SqlxArchiveEntryRepository, SqlxAuthorRepository, SqlxEventRepository,
    SqlxFavoriteRepository, SqlxLocationRepository, SqlxMediaFileRepository,
    SqlxPasswordResetRepository, SqlxSessionRepository, SqlxTourRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    ArchiveService, ArchiveServiceError, EmailService, EntityService, EventService,
    EventServiceError, FavoriteService, FavoriteServiceError, LoginRateLimiter, LookupError,
    LookupService, MapService, MediaService, MediaServiceError, TourService, TourServiceError,
    UserService, UserServiceError,
};
use crate::storage::LocalStorage;

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_response_time_us.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub archive_service: Arc<ArchiveService>,
    pub media_service: Arc<MediaService>,
    pub lookup_service: Arc<LookupService>,
    pub favorite_service: Arc<FavoriteService>,
    pub map_service: Arc<MapService>,
    pub tour_service: Arc<TourService>,
    pub event_service: Arc<EventService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub storage_config: Arc<StorageConfig>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories and services over a migrated pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let cache = create_cache(&config.cache);
        let storage = Arc::new(LocalStorage::new(
            config.storage.path.clone(),
            &config.storage.public_base_url,
        ));

        let entry_repo = SqlxArchiveEntryRepository::boxed(pool.clone());
        let author_repo = SqlxAuthorRepository::boxed(pool.clone());
        let location_repo = SqlxLocationRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            Arc::new(EmailService::new(config.smtp.clone())),
            config.auth.clone(),
        ));
        let media_service = Arc::new(MediaService::new(
            SqlxMediaFileRepository::boxed(pool.clone()),
            storage,
            config.storage.clone(),
        ));
        let entity_service = Arc::new(EntityService::new(
            author_repo.clone(),
            location_repo.clone(),
        ));
        let archive_service = Arc::new(ArchiveService::new(
            entry_repo.clone(),
            entity_service,
            media_service.clone(),
            cache,
        ));

        Self {
            user_service,
            lookup_service: Arc::new(LookupService::new(author_repo, location_repo)),
            favorite_service: Arc::new(FavoriteService::new(
                SqlxFavoriteRepository::boxed(pool.clone()),
                entry_repo.clone(),
            )),
            map_service: Arc::new(MapService::new(archive_service.clone())),
            tour_service: Arc::new(TourService::new(
                SqlxTourRepository::boxed(pool.clone()),
                entry_repo,
            )),
            event_service: Arc::new(EventService::new(SqlxEventRepository::boxed(pool.clone()))),
            archive_service,
            media_service,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            storage_config: Arc::new(config.storage.clone()),
            request_stats: Arc::new(RequestStats::new()),
            pool,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// The current user on routes behind [`optional_auth`], if logged in
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|u| u.0.clone()),
        ))
    }
}

impl OptionalUser {
    pub fn as_ref(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    /// Log the cause and hide it from the client
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Request failed");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<ArchiveServiceError> for ApiError {
    fn from(err: ArchiveServiceError) -> Self {
        match err {
            ArchiveServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ArchiveServiceError::NotFound(id) => ApiError::not_found(format!("Entry not found: {}", id)),
            ArchiveServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            // Entry exists; the client needs its id to retry the upload
            ArchiveServiceError::CoverUploadFailed { entry_id, reason } => ApiError::with_details(
                "MEDIA_UPLOAD_FAILED",
                format!("The entry was saved, but its cover upload failed: {}", reason),
                serde_json::json!({ "entry_id": entry_id }),
            ),
            ArchiveServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::InvalidResetToken => ApiError::validation_error(err.to_string()),
            UserServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<MediaServiceError> for ApiError {
    fn from(err: MediaServiceError) -> Self {
        match err {
            MediaServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            MediaServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<FavoriteServiceError> for ApiError {
    fn from(err: FavoriteServiceError) -> Self {
        match err {
            FavoriteServiceError::NotFound(id) => ApiError::not_found(format!("Entry not found: {}", id)),
            FavoriteServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::UnknownTable(_) => ApiError::validation_error(err.to_string()),
            LookupError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<TourServiceError> for ApiError {
    fn from(err: TourServiceError) -> Self {
        match err {
            TourServiceError::NotFound(id) => ApiError::not_found(format!("Tour not found: {}", id)),
            TourServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TourServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<EventServiceError> for ApiError {
    fn from(err: EventServiceError) -> Self {
        match err {
            EventServiceError::NotFound(id) => ApiError::not_found(format!("Event not found: {}", id)),
            EventServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            EventServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Extract session token from request headers. Bearer wins over the cookie.
pub fn extract_session_token(headers: &header::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware; never rejects
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        if let Ok(Some(user)) = state.user_service.validate_session(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state.request_stats.record(start.elapsed().as_micros() as u64);
    response
}
