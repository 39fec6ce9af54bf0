use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::db::services::UserError;
use crate::services::auth_service;
use crate::web::extractors::AppJson;
use crate::web::middleware::auth::TOKEN_COOKIE;
use crate::web::models::{
    AuthenticatedUser, LoginRequest, RegisterRequest, TokenResponse, UpdateUserRequest,
    UserResponse,
};
use crate::web::{AppError, AppState};

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(register_handler))
        .route("/token", post(token_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(me_handler).patch(update_me_handler))
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = auth_service::register_user(&app_state.db_pool, &app_state.config, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn token_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let token_response = auth_service::login_user(&app_state.db_pool, payload).await?;

    let auth_cookie = Cookie::build((TOKEN_COOKIE, token_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(token_response)))
}

async fn me_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = auth_service::current_user(&app_state.db_pool, auth_user.id).await?;
    Ok(Json(user))
}

async fn update_me_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = auth_service::update_current_user(
        &app_state.db_pool,
        &app_state.config,
        auth_user.id,
        payload,
    )
    .await?;
    Ok(Json(user))
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            UserError::MissingEmail => AppError::InvalidInput(err.to_string()),
            UserError::DuplicateEmail(_) => AppError::UserAlreadyExists(err.to_string()),
            UserError::Hashing(e) => AppError::PasswordHashingError(e.to_string()),
            UserError::NotFound(_) => AppError::NotFound(err.to_string()),
        }
    }
}
