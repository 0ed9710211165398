//! API layer - HTTP handlers and routing
//!
//! - Auth: registration, login, sessions, password reset
//! - Entries: listing, detail, submission
//! - Lookup, map, tours and events for the public pages
//! - Account: favorites and own submissions
//! - Upload: media attachments
//! - Admin: moderation, tour and event curation
//! - Static serving of the local media store under `/media`

pub mod account;
pub mod admin;
pub mod auth;
pub mod entries;
pub mod events;
pub mod lookup;
pub mod map;
pub mod middleware;
pub mod responses;
pub mod site;
pub mod tours;
pub mod upload;


use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser, RequestStats};

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Room for multipart boundaries and the `entry` JSON next to a file
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest(
            "/admin",
            admin::router()
                .merge(tours::admin_router())
                .merge(events::admin_router()),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/account", account::router())
        .nest("/upload", upload::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Routes that behave differently for logged-in users
    let optional_routes = Router::new()
        .nest("/auth", auth::optional_router())
        .merge(entries::optional_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(entries::public_router())
        .merge(lookup::router())
        .merge(map::router())
        .merge(tours::public_router())
        .merge(events::public_router())
        .merge(site::router())
        .merge(optional_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = cors_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::warn!(
            origin = cors_origin,
            fallback = DEFAULT_CORS_ORIGIN,
            "Invalid CORS origin, using fallback"
        );
        HeaderValue::from_static(DEFAULT_CORS_ORIGIN)
    });

    // Credentials allowed: the session cookie travels cross-origin
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let body_limit =
        usize::try_from(state.storage_config.max_file_size).unwrap_or(usize::MAX / 2)
            + MULTIPART_OVERHEAD;

    Router::new()
        .merge(site::root_router())
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/media", ServeDir::new(&state.storage_config.path))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(cors_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
