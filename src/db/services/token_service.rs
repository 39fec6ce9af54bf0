use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use tracing::{debug, info};

use crate::db::entities::{auth_token, prelude::AuthToken, user};

/// 20 random bytes, hex encoded.
pub const TOKEN_KEY_LENGTH: usize = 40;

fn generate_key() -> String {
    let bytes: [u8; TOKEN_KEY_LENGTH / 2] = rand::random();
    hex::encode(bytes)
}

pub struct TokenService;

impl TokenService {
    /// Returns the user's token, creating it on first use.
    pub async fn get_or_create(db: &DatabaseConnection, user_id: i32) -> Result<String, DbErr> {
        if let Some(existing) = Self::find_for_user(db, user_id).await? {
            return Ok(existing.key);
        }

        let token = auth_token::ActiveModel {
            key: Set(generate_key()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        };

        match token.insert(db).await {
            Ok(created) => {
                info!(user_id, "Issued new auth token.");
                Ok(created.key)
            }
            // Another request issued the token first; hand out that one.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(user_id, "Auth token created concurrently, reusing it.");
                Self::find_for_user(db, user_id)
                    .await?
                    .map(|t| t.key)
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn find_for_user(
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<Option<auth_token::Model>, DbErr> {
        AuthToken::find()
            .filter(auth_token::Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    /// Resolves a presented key to its owner.
    pub async fn find_user_by_key(
        db: &DatabaseConnection,
        key: &str,
    ) -> Result<Option<user::Model>, DbErr> {
        let found = AuthToken::find_by_id(key.to_string())
            .find_also_related(user::Entity)
            .one(db)
            .await?;
        Ok(found.and_then(|(_, user)| user))
    }
}
