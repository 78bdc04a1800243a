use axum::http::{Method, StatusCode};
use axum::routing::{get, options, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/solver/start", post(handlers::start))
        .route("/api/solver/start_with_locks", post(handlers::start_with_locks))
        .route("/api/solver/status/:run_id", get(handlers::status))
        .route("/api/plans/recent", get(handlers::recent))
        .route("/api/plans/:run_id/gantt", get(handlers::gantt))
        .route("/api/orders", post(handlers::create_order))
        .route("/api/*rest", options(|| async { StatusCode::NO_CONTENT }))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
