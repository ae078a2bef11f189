mod handlers;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/things/:thing_id/clients",
            post(handlers::create).get(handlers::list_by_thing),
        )
        .route("/groups/:group_id/clients", get(handlers::list_by_group))
        .route("/clients/:id", get(handlers::view).put(handlers::update))
        .route("/clients", patch(handlers::remove))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
