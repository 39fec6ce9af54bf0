use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::db::services::{
    ProfileChanges, TokenService, UserExtra, UserService, MAX_PASSWORD_BYTES,
};
use crate::server::config::ServerConfig;
use crate::web::error::AppError;
use crate::web::models::{
    LoginRequest, RegisterRequest, TokenResponse, UpdateUserRequest, UserResponse,
};

fn check_password(password: &str, min_length: usize) -> Result<(), AppError> {
    if password.chars().count() < min_length {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {min_length} characters long."
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::InvalidInput(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes long."
        )));
    }
    Ok(())
}

pub async fn register_user(
    pool: &DatabaseConnection,
    config: &ServerConfig,
    req: RegisterRequest,
) -> Result<UserResponse, AppError> {
    if req.email.trim().is_empty() {
        return Err(AppError::InvalidInput("Email must not be empty.".to_string()));
    }
    check_password(&req.password, config.password_min_length)?;

    let extra = UserExtra {
        name: req.name,
        ..Default::default()
    };
    let user =
        UserService::create_user(pool, &req.email, &req.password, extra, config.bcrypt_cost).await?;
    Ok(user.into())
}

pub async fn login_user(
    pool: &DatabaseConnection,
    req: LoginRequest,
) -> Result<TokenResponse, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Email and password must not be empty.".to_string(),
        ));
    }

    let user = UserService::verify_credentials(pool, &req.email, &req.password)
        .await?
        .ok_or_else(|| {
            warn!("Failed login attempt.");
            AppError::InvalidCredentials
        })?;

    let token = TokenService::get_or_create(pool, user.id).await?;
    info!(user_id = user.id, "User authenticated.");
    Ok(TokenResponse { token })
}

pub async fn current_user(
    pool: &DatabaseConnection,
    user_id: i32,
) -> Result<UserResponse, AppError> {
    Ok(UserService::find_by_id(pool, user_id).await?.into())
}

pub async fn update_current_user(
    pool: &DatabaseConnection,
    config: &ServerConfig,
    user_id: i32,
    req: UpdateUserRequest,
) -> Result<UserResponse, AppError> {
    if let Some(password) = req.password.as_deref() {
        check_password(password, config.password_min_length)?;
    }

    let changes = ProfileChanges {
        email: req.email,
        name: req.name,
        password: req.password,
    };
    let user = UserService::update_profile(pool, user_id, changes, config.bcrypt_cost).await?;
    Ok(user.into())
}
