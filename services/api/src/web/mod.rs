pub mod auth;
pub mod documents;
pub mod files;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use rest::ApiDoc;

/// Builds the complete router: public auth and file routes, session-protected view
/// routes, and the Swagger UI.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/files/{*key}", get(files::file_handler));

    let protected_routes = Router::new()
        .route(
            "/view",
            get(rest::get_view_handler).put(rest::select_view_handler),
        )
        .route("/members", post(rest::add_member_handler))
        .route("/members/{member_id}", delete(rest::delete_member_handler))
        .route("/members/{member_id}/open", post(rest::open_member_handler))
        .route(
            "/members/{member_id}/documents",
            post(documents::upload_document_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// CORS for the configured frontend origin. Credentials are allowed so the session
/// cookie travels with cross-origin requests.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]))
}
