use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use chatgate_core::{Claims, TokenAuthority};

use crate::error::AppError;

/// The verified caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub sub: String,
    pub claims: Claims,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            sub: claims.sub.clone(),
            claims,
        }
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| {
            AppError::MissingCredentials(
                "No token supplied in the Authorization header".to_string(),
            )
        })?
        .to_str()
        .map_err(|_| AppError::MissingCredentials("Malformed Authorization header".to_string()))?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AppError::MissingCredentials(
            "Malformed Authorization header".to_string(),
        )),
    }
}

pub fn authenticate(tokens: &TokenAuthority, headers: &HeaderMap) -> Result<Claims, AppError> {
    let token = bearer_token(headers)?;
    tokens.verify(token).map_err(|e| {
        tracing::debug!("Token rejected: {e}");
        AppError::from(e)
    })
}

/// Route layer for protected routes: rejects the request unless it carries a
/// valid token, and hands the verified [`Claims`] to the handler.
pub async fn require_auth(
    State(tokens): State<Arc<TokenAuthority>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(&tokens, req.headers())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenAuthority>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already verified by `require_auth`.
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(claims.clone().into());
        }

        let tokens = Arc::<TokenAuthority>::from_ref(state);
        authenticate(&tokens, &parts.headers).map(AuthUser::from)
    }
}
