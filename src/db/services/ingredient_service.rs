use chrono::Utc;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{
    prelude::{Ingredient, RecipeIngredient},
    ingredient, recipe_ingredient,
};

#[derive(Debug, thiserror::Error)]
pub enum IngredientError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Ingredient not found: {0}")]
    NotFound(i32),
    #[error("Ingredient name must not be blank.")]
    BlankName,
}

fn validated_name(name: &str) -> Result<String, IngredientError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IngredientError::BlankName);
    }
    Ok(name.to_string())
}

pub struct IngredientService;

impl IngredientService {
    pub async fn create_ingredient(
        db: &DatabaseConnection,
        user_id: i32,
        name: &str,
    ) -> Result<ingredient::Model, IngredientError> {
        let new_ingredient = ingredient::ActiveModel {
            user_id: Set(user_id),
            name: Set(validated_name(name)?),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let ingredient = new_ingredient.insert(db).await?;
        info!(ingredient_id = ingredient.id, user_id, "Created ingredient.");
        Ok(ingredient)
    }

    /// Ingredients owned by the user, by descending name. With `assigned_only`, only
    /// ingredients attached to at least one recipe are returned.
    pub async fn get_ingredients_by_user(
        db: &DatabaseConnection,
        user_id: i32,
        assigned_only: bool,
    ) -> Result<Vec<ingredient::Model>, IngredientError> {
        let mut query = Ingredient::find().filter(ingredient::Column::UserId.eq(user_id));

        if assigned_only {
            query = query.filter(
                ingredient::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_ingredient::Column::IngredientId)
                        .from(RecipeIngredient)
                        .to_owned(),
                ),
            );
        }

        Ok(query
            .order_by_desc(ingredient::Column::Name)
            .order_by_desc(ingredient::Column::Id)
            .all(db)
            .await?)
    }

    pub async fn get_ingredient_by_id(
        db: &DatabaseConnection,
        ingredient_id: i32,
        user_id: i32,
    ) -> Result<ingredient::Model, IngredientError> {
        Ingredient::find_by_id(ingredient_id)
            .filter(ingredient::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(IngredientError::NotFound(ingredient_id))
    }

    pub async fn rename_ingredient(
        db: &DatabaseConnection,
        ingredient_id: i32,
        user_id: i32,
        name: &str,
    ) -> Result<ingredient::Model, IngredientError> {
        let name = validated_name(name)?;
        let ingredient = Self::get_ingredient_by_id(db, ingredient_id, user_id).await?;

        let mut active_ingredient: ingredient::ActiveModel = ingredient.into();
        active_ingredient.name = Set(name);
        Ok(active_ingredient.update(db).await?)
    }

    /// Deletes the ingredient and detaches it from every recipe.
    pub async fn delete_ingredient(
        db: &DatabaseConnection,
        ingredient_id: i32,
        user_id: i32,
    ) -> Result<(), IngredientError> {
        let ingredient = Self::get_ingredient_by_id(db, ingredient_id, user_id).await?;

        let txn = db.begin().await?;
        RecipeIngredient::delete_many()
            .filter(recipe_ingredient::Column::IngredientId.eq(ingredient.id))
            .exec(&txn)
            .await?;
        ingredient.delete(&txn).await?;
        txn.commit().await?;

        info!(ingredient_id, user_id, "Deleted ingredient.");
        Ok(())
    }
}
