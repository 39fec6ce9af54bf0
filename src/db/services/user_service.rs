use bcrypt::{non_truncating_hash, non_truncating_verify, BcryptError};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use tracing::{debug, info};

use crate::db::entities::{prelude::User, user};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Users must have an email address.")]
    MissingEmail,
    #[error("A user with the email '{0}' already exists.")]
    DuplicateEmail(String),
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] BcryptError),
    #[error("User {0} not found")]
    NotFound(i32),
}

/// Optional attributes supplied alongside email and password at creation time.
#[derive(Debug, Clone, Default)]
pub struct UserExtra {
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Partial profile update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// bcrypt only covers this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Emails are stored and looked up lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn map_unique_violation(err: DbErr, email: &str) -> UserError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => UserError::DuplicateEmail(email.to_string()),
        _ => UserError::DbErr(err),
    }
}

pub struct UserService;

impl UserService {
    pub async fn create_user(
        db: &DatabaseConnection,
        email: &str,
        password: &str,
        extra: UserExtra,
        bcrypt_cost: u32,
    ) -> Result<user::Model, UserError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(UserError::MissingEmail);
        }

        if Self::find_by_email(db, &email).await?.is_some() {
            return Err(UserError::DuplicateEmail(email));
        }

        let password_hash = non_truncating_hash(password, bcrypt_cost)?;
        let now = Utc::now();

        let new_user = user::ActiveModel {
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            name: Set(extra.name),
            is_active: Set(true),
            is_staff: Set(extra.is_staff),
            is_superuser: Set(extra.is_superuser),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        // The pre-check above can race with a concurrent registration.
        let user = new_user
            .insert(db)
            .await
            .map_err(|e| map_unique_violation(e, &email))?;
        info!(user_id = user.id, "Created user.");
        Ok(user)
    }

    pub async fn create_superuser(
        db: &DatabaseConnection,
        email: &str,
        password: &str,
        name: String,
        bcrypt_cost: u32,
    ) -> Result<user::Model, UserError> {
        let extra = UserExtra {
            name,
            is_staff: true,
            is_superuser: true,
        };
        Self::create_user(db, email, password, extra, bcrypt_cost).await
    }

    pub async fn find_by_email(
        db: &DatabaseConnection,
        email: &str,
    ) -> Result<Option<user::Model>, UserError> {
        let user = User::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<user::Model, UserError> {
        User::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or(UserError::NotFound(user_id))
    }

    /// Returns the user only if it exists, is active and the password matches.
    pub async fn verify_credentials(
        db: &DatabaseConnection,
        email: &str,
        password: &str,
    ) -> Result<Option<user::Model>, UserError> {
        if email.trim().is_empty() || password.is_empty() {
            return Ok(None);
        }

        let Some(user) = Self::find_by_email(db, email).await? else {
            debug!("Credential check for unknown email.");
            return Ok(None);
        };

        if !user.is_active {
            debug!(user_id = user.id, "Credential check for inactive user.");
            return Ok(None);
        }

        // No stored hash covers more than 72 bytes, so a longer password never matches.
        match non_truncating_verify(password, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            Ok(false) | Err(BcryptError::Truncation(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update_profile(
        db: &DatabaseConnection,
        user_id: i32,
        changes: ProfileChanges,
        bcrypt_cost: u32,
    ) -> Result<user::Model, UserError> {
        let existing = Self::find_by_id(db, user_id).await?;
        let mut active_user: user::ActiveModel = existing.clone().into();

        let mut new_email = None;
        if let Some(email) = changes.email {
            let email = normalize_email(&email);
            if email.is_empty() {
                return Err(UserError::MissingEmail);
            }
            if email != existing.email {
                if Self::find_by_email(db, &email).await?.is_some() {
                    return Err(UserError::DuplicateEmail(email));
                }
                active_user.email = Set(email.clone());
                new_email = Some(email);
            }
        }
        if let Some(name) = changes.name {
            active_user.name = Set(name);
        }
        if let Some(password) = changes.password {
            active_user.password_hash = Set(non_truncating_hash(password, bcrypt_cost)?);
        }
        active_user.updated_at = Set(Utc::now());

        let updated = active_user.update(db).await.map_err(|e| {
            map_unique_violation(e, new_email.as_deref().unwrap_or(&existing.email))
        })?;
        info!(user_id = updated.id, "Updated user profile.");
        Ok(updated)
    }
}
