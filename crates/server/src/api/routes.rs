use axum::{
    extract::State,
    http::header,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{capabilities, completed, files, handlers, jobs, middleware::metrics_middleware};
use super::{settings, ws};
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/engine", get(handlers::get_engine))
        .route("/engine/check", post(handlers::check_engine))
        // File registry
        .route("/files", get(files::list_files))
        .route("/files", post(files::register_file))
        .route("/files", delete(files::delete_all))
        .route("/files/error", get(files::get_notice))
        .route("/files/{id}", get(files::get_file))
        .route("/files/{id}", delete(files::remove_file))
        .route("/files/{id}/target", put(files::set_target))
        // Jobs
        .route("/jobs/start", post(jobs::start_jobs))
        .route("/jobs/cancel", post(jobs::cancel_all))
        .route("/jobs/status", get(jobs::get_status))
        .route("/jobs/{id}/cancel", post(jobs::cancel_job))
        // Completed-jobs ledger
        .route("/completed", get(completed::list_completed))
        .route("/completed", delete(completed::clear_completed))
        // Settings
        .route("/settings", get(settings::get_settings))
        .route("/settings", put(settings::update_settings))
        // Capabilities
        .route("/capabilities", get(capabilities::get_capabilities))
        .route("/capabilities/{extension}", get(capabilities::describe_extension))
        // Event stream
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
