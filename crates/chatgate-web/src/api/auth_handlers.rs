use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chatgate_core::{CoreError, UserRecord};

use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_string();

    if username.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username, email and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    if state.users.user_exists(&username, &email).await? {
        return Err(CoreError::UserExists.into());
    }

    let password = body.password;
    let hash = tokio::task::spawn_blocking(move || {
        crate::auth::password::hash_password(&password)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    state
        .users
        .create_user(UserRecord::new(username.clone(), email, hash))
        .await?;

    tracing::info!("Registered user: {username}");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            username,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state.users.find_user(body.username.trim()).await?;

    let hash = user.password_hash.clone();
    let password = body.password;
    let valid = tokio::task::spawn_blocking(move || {
        crate::auth::password::verify_password(&hash, &password)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    if !valid {
        tracing::warn!("Failed login attempt for user: {}", user.username);
        return Err(AppError::Forbidden("Invalid credentials".to_string()));
    }

    let issued = state.tokens.issue(&user.username).map_err(|e| {
        tracing::error!("Failed to generate token for user {}: {e}", user.username);
        AppError::from(e)
    })?;

    tracing::info!("Issued token for user: {}", user.username);

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}
