pub mod protocol;
pub mod rest;
pub mod scheduler_task;
pub mod state;
pub mod ws_handler;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use scheduler_task::spawn_scheduler;
pub use ws_handler::ws_handler;

use crate::error::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{delete, get, patch, post},
    Router,
};
use rest::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Proof photos from phone cameras comfortably fit under this limit.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Builds the complete application router: REST, WebSocket and Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::CorsOrigin {
            origin: app_state.config.cors_origin.clone(),
            reason: e.to_string(),
        })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route("/state", get(rest::get_state_handler))
        .route(
            "/tasks",
            get(rest::list_tasks_handler).post(rest::create_task_handler),
        )
        .route(
            "/tasks/{id}",
            patch(rest::update_task_handler).delete(rest::delete_task_handler),
        )
        .route("/tasks/{id}/photo", get(rest::task_photo_handler))
        .route("/history", get(rest::history_handler))
        .route("/alarm/trigger/{id}", post(rest::trigger_alarm_handler))
        .route("/alarm/test", post(rest::test_alarm_handler))
        .route("/alarm/cancel", post(rest::cancel_alarm_handler))
        .route("/alarm/dismiss", post(rest::dismiss_alarm_handler))
        .route("/alarm/photo", post(rest::submit_photo_handler))
        .route(
            "/profile",
            get(rest::get_profile_handler).put(rest::update_profile_handler),
        )
        .route("/notice", delete(rest::clear_notice_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
