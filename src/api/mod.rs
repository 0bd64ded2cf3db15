pub mod dto;
pub mod errors;
pub mod handlers;
pub mod state;
pub mod stats;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/readings", get(handlers::list_readings))
        .route("/api/readings/last", get(handlers::latest_reading))
        .route(
            "/api/dht-light-readings",
            get(handlers::list_dht_light_readings).post(handlers::create_dht_light_reading),
        )
        .route(
            "/api/dht-light-readings/latest",
            get(handlers::latest_dht_light_reading),
        )
        .route(
            "/api/bme-readings",
            get(handlers::list_bme_readings).post(handlers::create_bme_reading),
        )
        .route("/api/bme-readings/latest", get(handlers::latest_bme_reading))
        .route("/api/stats/current", get(stats::current))
        .route("/api/stats/daily", get(stats::daily))
        .route("/api/stats/compliance", get(stats::compliance))
        .route("/api/dayle-stats/daily-bme", get(stats::daily_bme))
        .route("/api/dayle-stats/daily-dht-light", get(stats::daily_dht_light))
        .route("/health", get(handlers::health))
        .with_state(state)
        .split_for_parts();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .route("/", get(handlers::root))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
