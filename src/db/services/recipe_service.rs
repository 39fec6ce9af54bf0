use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{
    ingredient,
    prelude::{Ingredient, Recipe, RecipeIngredient, RecipeTag, Tag},
    recipe, recipe_ingredient, recipe_tag, tag,
};

/// Upper bound for a price of at most 5 digits with 2 decimals (999.99).
pub const MAX_PRICE_CENTS: i32 = 99_999;

#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Recipe not found: {0}")]
    NotFound(i32),
    #[error("Recipe title must not be blank.")]
    BlankTitle,
    #[error("time_minutes must not be negative.")]
    NegativeTime,
    #[error("Price must be between 0.00 and 999.99.")]
    PriceOutOfRange,
    #[error("Unknown tag ids: {0:?}")]
    UnknownTags(Vec<i32>),
    #[error("Unknown ingredient ids: {0:?}")]
    UnknownIngredients(Vec<i32>),
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price_cents: i32,
    pub link: Option<String>,
    pub tags: Vec<i32>,
    pub ingredients: Vec<i32>,
}

/// Partial recipe update. `tags`/`ingredients` replace the whole link set when present.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price_cents: Option<i32>,
    pub link: Option<Option<String>>,
    pub tags: Option<Vec<i32>>,
    pub ingredients: Option<Vec<i32>>,
}

/// Recipes matching any of `tags` and any of `ingredients`; empty means no constraint.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub tags: Vec<i32>,
    pub ingredients: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct RecipeWithLinks {
    pub recipe: recipe::Model,
    pub tag_ids: Vec<i32>,
    pub ingredient_ids: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: recipe::Model,
    pub tags: Vec<tag::Model>,
    pub ingredients: Vec<ingredient::Model>,
}

fn validated_title(title: &str) -> Result<String, RecipeError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(RecipeError::BlankTitle);
    }
    Ok(title.to_string())
}

fn check_time(time_minutes: i32) -> Result<i32, RecipeError> {
    if time_minutes < 0 {
        return Err(RecipeError::NegativeTime);
    }
    Ok(time_minutes)
}

fn check_price(price_cents: i32) -> Result<i32, RecipeError> {
    if !(0..=MAX_PRICE_CENTS).contains(&price_cents) {
        return Err(RecipeError::PriceOutOfRange);
    }
    Ok(price_cents)
}

fn dedup(ids: &[i32]) -> Vec<i32> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

async fn ensure_owned_tags<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    tag_ids: &[i32],
) -> Result<(), RecipeError> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let found: BTreeSet<i32> = Tag::find()
        .select_only()
        .column(tag::Column::Id)
        .filter(tag::Column::UserId.eq(user_id))
        .filter(tag::Column::Id.is_in(tag_ids.to_vec()))
        .into_tuple::<i32>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    let missing: Vec<i32> = tag_ids.iter().copied().filter(|id| !found.contains(id)).collect();
    if !missing.is_empty() {
        return Err(RecipeError::UnknownTags(missing));
    }
    Ok(())
}

async fn ensure_owned_ingredients<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    ingredient_ids: &[i32],
) -> Result<(), RecipeError> {
    if ingredient_ids.is_empty() {
        return Ok(());
    }
    let found: BTreeSet<i32> = Ingredient::find()
        .select_only()
        .column(ingredient::Column::Id)
        .filter(ingredient::Column::UserId.eq(user_id))
        .filter(ingredient::Column::Id.is_in(ingredient_ids.to_vec()))
        .into_tuple::<i32>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    let missing: Vec<i32> = ingredient_ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect();
    if !missing.is_empty() {
        return Err(RecipeError::UnknownIngredients(missing));
    }
    Ok(())
}

async fn replace_tag_links<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i32,
    tag_ids: &[i32],
) -> Result<(), DbErr> {
    RecipeTag::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;
    if tag_ids.is_empty() {
        return Ok(());
    }
    let links = tag_ids.iter().map(|&tag_id| recipe_tag::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(tag_id),
    });
    RecipeTag::insert_many(links).exec_without_returning(conn).await?;
    Ok(())
}

async fn replace_ingredient_links<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i32,
    ingredient_ids: &[i32],
) -> Result<(), DbErr> {
    RecipeIngredient::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;
    if ingredient_ids.is_empty() {
        return Ok(());
    }
    let links = ingredient_ids
        .iter()
        .map(|&ingredient_id| recipe_ingredient::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(ingredient_id),
        });
    RecipeIngredient::insert_many(links)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Loads the tag and ingredient ids of each recipe, keeping the input order.
async fn attach_links<C: ConnectionTrait>(
    conn: &C,
    recipes: Vec<recipe::Model>,
) -> Result<Vec<RecipeWithLinks>, DbErr> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let recipe_ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();

    let mut tags_by_recipe: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in RecipeTag::find()
        .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.clone()))
        .order_by_asc(recipe_tag::Column::TagId)
        .all(conn)
        .await?
    {
        tags_by_recipe.entry(link.recipe_id).or_default().push(link.tag_id);
    }

    let mut ingredients_by_recipe: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in RecipeIngredient::find()
        .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids))
        .order_by_asc(recipe_ingredient::Column::IngredientId)
        .all(conn)
        .await?
    {
        ingredients_by_recipe
            .entry(link.recipe_id)
            .or_default()
            .push(link.ingredient_id);
    }

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeWithLinks {
            tag_ids: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
            ingredient_ids: ingredients_by_recipe.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i32,
    user_id: i32,
) -> Result<recipe::Model, RecipeError> {
    Recipe::find_by_id(recipe_id)
        .filter(recipe::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(RecipeError::NotFound(recipe_id))
}

pub struct RecipeService;

impl RecipeService {
    pub async fn create_recipe(
        db: &DatabaseConnection,
        user_id: i32,
        new_recipe: NewRecipe,
    ) -> Result<RecipeWithLinks, RecipeError> {
        let title = validated_title(&new_recipe.title)?;
        let time_minutes = check_time(new_recipe.time_minutes)?;
        let price_cents = check_price(new_recipe.price_cents)?;
        let tag_ids = dedup(&new_recipe.tags);
        let ingredient_ids = dedup(&new_recipe.ingredients);

        let txn = db.begin().await?;
        ensure_owned_tags(&txn, user_id, &tag_ids).await?;
        ensure_owned_ingredients(&txn, user_id, &ingredient_ids).await?;

        let now = Utc::now();
        let recipe = recipe::ActiveModel {
            user_id: Set(user_id),
            title: Set(title),
            time_minutes: Set(time_minutes),
            price_cents: Set(price_cents),
            link: Set(new_recipe.link),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        replace_tag_links(&txn, recipe.id, &tag_ids).await?;
        replace_ingredient_links(&txn, recipe.id, &ingredient_ids).await?;
        txn.commit().await?;

        info!(recipe_id = recipe.id, user_id, "Created recipe.");
        Ok(RecipeWithLinks {
            recipe,
            tag_ids,
            ingredient_ids,
        })
    }

    /// Recipes owned by the user, newest first.
    pub async fn get_recipes_by_user(
        db: &DatabaseConnection,
        user_id: i32,
        filter: &RecipeFilter,
    ) -> Result<Vec<RecipeWithLinks>, RecipeError> {
        let mut query = Recipe::find().filter(recipe::Column::UserId.eq(user_id));

        if !filter.tags.is_empty() {
            query = query.filter(
                recipe::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_tag::Column::RecipeId)
                        .from(RecipeTag)
                        .and_where(recipe_tag::Column::TagId.is_in(filter.tags.clone()))
                        .to_owned(),
                ),
            );
        }
        if !filter.ingredients.is_empty() {
            query = query.filter(
                recipe::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_ingredient::Column::RecipeId)
                        .from(RecipeIngredient)
                        .and_where(
                            recipe_ingredient::Column::IngredientId
                                .is_in(filter.ingredients.clone()),
                        )
                        .to_owned(),
                ),
            );
        }

        let recipes = query.order_by_desc(recipe::Column::Id).all(db).await?;
        Ok(attach_links(db, recipes).await?)
    }

    pub async fn get_recipe_detail(
        db: &DatabaseConnection,
        recipe_id: i32,
        user_id: i32,
    ) -> Result<RecipeDetail, RecipeError> {
        let recipe = find_owned(db, recipe_id, user_id).await?;
        let tags = recipe
            .find_related(Tag)
            .order_by_desc(tag::Column::Name)
            .all(db)
            .await?;
        let ingredients = recipe
            .find_related(Ingredient)
            .order_by_desc(ingredient::Column::Name)
            .all(db)
            .await?;
        Ok(RecipeDetail {
            recipe,
            tags,
            ingredients,
        })
    }

    pub async fn update_recipe(
        db: &DatabaseConnection,
        recipe_id: i32,
        user_id: i32,
        changes: RecipeChanges,
    ) -> Result<RecipeWithLinks, RecipeError> {
        let txn = db.begin().await?;
        let existing = find_owned(&txn, recipe_id, user_id).await?;
        let mut active_recipe: recipe::ActiveModel = existing.into();

        if let Some(title) = changes.title {
            active_recipe.title = Set(validated_title(&title)?);
        }
        if let Some(time_minutes) = changes.time_minutes {
            active_recipe.time_minutes = Set(check_time(time_minutes)?);
        }
        if let Some(price_cents) = changes.price_cents {
            active_recipe.price_cents = Set(check_price(price_cents)?);
        }
        if let Some(link) = changes.link {
            active_recipe.link = Set(link);
        }
        if let Some(tags) = changes.tags {
            let tag_ids = dedup(&tags);
            ensure_owned_tags(&txn, user_id, &tag_ids).await?;
            replace_tag_links(&txn, recipe_id, &tag_ids).await?;
        }
        if let Some(ingredients) = changes.ingredients {
            let ingredient_ids = dedup(&ingredients);
            ensure_owned_ingredients(&txn, user_id, &ingredient_ids).await?;
            replace_ingredient_links(&txn, recipe_id, &ingredient_ids).await?;
        }
        active_recipe.updated_at = Set(Utc::now());

        let recipe = active_recipe.update(&txn).await?;
        let mut with_links = attach_links(&txn, vec![recipe]).await?;
        txn.commit().await?;

        info!(recipe_id, user_id, "Updated recipe.");
        with_links.pop().ok_or(RecipeError::NotFound(recipe_id))
    }

    pub async fn delete_recipe(
        db: &DatabaseConnection,
        recipe_id: i32,
        user_id: i32,
    ) -> Result<(), RecipeError> {
        let txn = db.begin().await?;
        let recipe = find_owned(&txn, recipe_id, user_id).await?;
        replace_tag_links(&txn, recipe.id, &[]).await?;
        replace_ingredient_links(&txn, recipe.id, &[]).await?;
        recipe.delete(&txn).await?;
        txn.commit().await?;

        info!(recipe_id, user_id, "Deleted recipe.");
        Ok(())
    }
}

#[cfg(test)]
impl NewRecipe {
    pub fn sample(title: &str) -> Self {
        NewRecipe {
            title: title.to_string(),
            time_minutes: 10,
            price_cents: 500,
            link: None,
            tags: Vec::new(),
            ingredients: Vec::new(),
        }
    }
}
