pub mod exams;
pub mod health;
pub mod media;
pub mod practice;
pub mod share;

use crate::middleware::{
    auth::require_session,
    cors::webapp_cors,
    rate_limit::{rps_middleware, RateLimiter},
};
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// `api_rps` throttles the generation and storage API, `public_rps` the
/// unauthenticated share and health endpoints.
pub fn build_router(state: AppState, api_rps: u32, public_rps: u32) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let session_api = Router::new()
        .route("/api/exams", get(exams::list_exams).post(exams::save_exam))
        .route(
            "/api/exams/:id",
            get(exams::get_exam).delete(exams::delete_exam),
        )
        .route(
            "/api/exams/:id/attempts",
            get(exams::list_attempts).post(exams::submit_attempt),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let generation_api = Router::new()
        .route("/api/exams/generate", post(exams::generate_exam))
        .route("/api/exams/normalize", post(exams::normalize))
        .route("/api/practice/check", post(practice::check_answer))
        .route("/api/grade", post(practice::grade_writing))
        .route("/api/audio", post(media::generate_audio))
        .route("/api/images", post(media::generate_image))
        .route("/api/images/stock", get(media::stock_image))
        .route("/api/share", post(share::create_share_link));

    let api = session_api
        .merge(generation_api)
        .layer(middleware::from_fn_with_state(
            RateLimiter::new(api_rps),
            rps_middleware,
        ));

    let public_api = Router::new()
        .route("/api/public/exam", get(share::public_exam))
        .merge(base_routes)
        .layer(middleware::from_fn_with_state(
            RateLimiter::new(public_rps),
            rps_middleware,
        ));

    Router::new()
        .merge(api)
        .merge(public_api)
        .layer(webapp_cors(&state.webapp_url))
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
