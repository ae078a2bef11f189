mod handlers;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/things/:thing_id/downlinks",
            post(handlers::create).get(handlers::list_by_thing),
        )
        .route("/groups/:group_id/downlinks", get(handlers::list_by_group))
        .route("/downlinks/:id", get(handlers::view).put(handlers::update))
        .route("/downlinks", patch(handlers::remove))
        .route("/backup", get(handlers::backup))
        .route("/restore", post(handlers::restore))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
