use axum::http::{header, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::middleware::require_auth;
use crate::middleware::rate_limit::{rate_limit, RateLimitGate};
use crate::state::AppState;

/// Assembles the HTTP surface.
///
/// Rate limiting wraps every route, including unknown paths. Token
/// verification is a route layer on the protected routes only, so it runs
/// after the rate limit check and never for public routes.
pub fn router(state: AppState) -> Router {
    let gate = RateLimitGate::new(
        state.limiter.clone(),
        state.config.rate_limit.trust_forwarded_headers,
    );

    let protected =
        api::protected_router().route_layer(from_fn_with_state(state.tokens.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api::auth_router().merge(protected))
        .layer(from_fn_with_state(gate, rate_limit))
        .layer(RequestBodyLimitLayer::new(state.config.http.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
