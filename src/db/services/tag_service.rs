use chrono::Utc;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{
    prelude::{RecipeTag, Tag},
    recipe_tag, tag,
};

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Tag not found: {0}")]
    NotFound(i32),
    #[error("Tag name must not be blank.")]
    BlankName,
}

fn validated_name(name: &str) -> Result<String, TagError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagError::BlankName);
    }
    Ok(name.to_string())
}

pub struct TagService;

impl TagService {
    pub async fn create_tag(
        db: &DatabaseConnection,
        user_id: i32,
        name: &str,
    ) -> Result<tag::Model, TagError> {
        let new_tag = tag::ActiveModel {
            user_id: Set(user_id),
            name: Set(validated_name(name)?),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let tag = new_tag.insert(db).await?;
        info!(tag_id = tag.id, user_id, "Created tag.");
        Ok(tag)
    }

    /// Tags owned by the user, by descending name. With `assigned_only`, only
    /// tags attached to at least one recipe are returned.
    pub async fn get_tags_by_user(
        db: &DatabaseConnection,
        user_id: i32,
        assigned_only: bool,
    ) -> Result<Vec<tag::Model>, TagError> {
        let mut query = Tag::find().filter(tag::Column::UserId.eq(user_id));

        if assigned_only {
            query = query.filter(
                tag::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_tag::Column::TagId)
                        .from(RecipeTag)
                        .to_owned(),
                ),
            );
        }

        Ok(query
            .order_by_desc(tag::Column::Name)
            .order_by_desc(tag::Column::Id)
            .all(db)
            .await?)
    }

    pub async fn get_tag_by_id(
        db: &DatabaseConnection,
        tag_id: i32,
        user_id: i32,
    ) -> Result<tag::Model, TagError> {
        Tag::find_by_id(tag_id)
            .filter(tag::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(TagError::NotFound(tag_id))
    }

    pub async fn rename_tag(
        db: &DatabaseConnection,
        tag_id: i32,
        user_id: i32,
        name: &str,
    ) -> Result<tag::Model, TagError> {
        let name = validated_name(name)?;
        let tag = Self::get_tag_by_id(db, tag_id, user_id).await?;

        let mut active_tag: tag::ActiveModel = tag.into();
        active_tag.name = Set(name);
        Ok(active_tag.update(db).await?)
    }

    /// Deletes the tag and detaches it from every recipe.
    pub async fn delete_tag(
        db: &DatabaseConnection,
        tag_id: i32,
        user_id: i32,
    ) -> Result<(), TagError> {
        let tag = Self::get_tag_by_id(db, tag_id, user_id).await?;

        let txn = db.begin().await?;
        RecipeTag::delete_many()
            .filter(recipe_tag::Column::TagId.eq(tag.id))
            .exec(&txn)
            .await?;
        tag.delete(&txn).await?;
        txn.commit().await?;

        info!(tag_id, user_id, "Deleted tag.");
        Ok(())
    }
}
