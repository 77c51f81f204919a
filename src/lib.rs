// Library exports for the API binary and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use middleware::auth::JwtSecret;
use services::menu::MenuService;
use store::AccountLedger;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub menus: Arc<MenuService>,
    pub ledger: Arc<dyn AccountLedger>,
}

/// Build the HTTP router. Layers run outside-in: CORS, tracing, request log,
/// then the JWT secret extension the auth extractor reads.
pub fn build_router(state: AppState, jwt_secret: JwtSecret) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/menu",
            get(routes::menu::get_menu)
                .post(routes::menu::post_menu)
                .put(routes::menu::put_menu),
        )
        .route("/menu/{menu_id}", patch(routes::menu::patch_menu))
        .route("/account/balance", get(routes::account::get_balance))
        .layer(axum::Extension(jwt_secret))
        .layer(axum::middleware::from_fn(middleware::request_log::log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
