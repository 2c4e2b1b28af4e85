use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/strategies", get(handlers::list_strategies))
        .route("/strategies/validate", post(handlers::validate_strategy))
        .route("/strategies/:id", get(handlers::get_strategy))
        .route(
            "/agents",
            get(handlers::list_agents).post(handlers::create_agent),
        )
        .route(
            "/agents/:id",
            get(handlers::get_agent)
                .patch(handlers::update_agent)
                .delete(handlers::delete_agent),
        )
        .route("/agents/:id/start", post(handlers::start_agent))
        .route("/agents/:id/stop", post(handlers::stop_agent))
        .route("/agents/:id/pause", post(handlers::pause_agent))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
