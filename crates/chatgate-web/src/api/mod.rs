mod auth_handlers;

use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::auth::middleware::AuthUser;
use crate::dto::MeResponse;
use crate::state::AppState;

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

/// Echoes the verified claims of the caller.
async fn me(user: AuthUser) -> Json<MeResponse> {
    tracing::debug!("Authenticated request from {}", user.sub);
    Json(user.claims.into())
}
