use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::services::TokenService;
use crate::web::models::AuthenticatedUser;
use crate::web::{error::AppError, AppState};

pub const TOKEN_COOKIE: &str = "token";

/// Pulls the token from `Authorization: Bearer <key>` (or `Token <key>`).
fn token_from_header(req: &Request<AxumBody>) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Token "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    // Try to get token from Authorization header first, then fall back to cookie
    let token = token_from_header(&req)
        .or_else(|| jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

    let user = TokenService::find_user_by_key(&state.db_pool, &token)
        .await?
        .ok_or_else(|| {
            debug!("Rejected unknown auth token.");
            AppError::Unauthorized("Invalid token.".to_string())
        })?;

    if !user.is_active {
        warn!(user_id = user.id, "Token presented for inactive user.");
        return Err(AppError::Unauthorized("User inactive or deleted.".to_string()));
    }

    req.extensions_mut().insert(AuthenticatedUser { id: user.id });
    Ok(next.run(req).await)
}
