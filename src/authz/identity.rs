use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use crate::errors::AppError;
use crate::jwt::{JwtConfig, TokenError};

const BEARER_PREFIX: &str = "Bearer ";

/// Validates the bearer token and stores its [`Claims`](crate::jwt::Claims)
/// in the request extensions. Never touches storage.
pub async fn authenticate(
    State(jwt): State<Arc<JwtConfig>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or_else(|| {
            tracing::debug!("missing or malformed authorization header");
            AppError::unauthorized("unauthorized")
        })?;

    let claims = jwt.validate(token).map_err(|err| {
        match &err {
            TokenError::Expired => tracing::debug!("rejected expired token"),
            TokenError::BadSignature => tracing::warn!(reason = %err, "rejected token"),
            _ => tracing::debug!(reason = %err, "rejected token"),
        }
        AppError::from(err)
    })?;

    if claims.is_expired_at(Utc::now()) {
        tracing::debug!(user_id = claims.sub, "token expired between checks");
        return Err(TokenError::Expired.into());
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
