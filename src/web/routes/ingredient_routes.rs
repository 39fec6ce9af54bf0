use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::db::services::{IngredientError, IngredientService};
use crate::web::extractors::{AppJson, AppPath, AppQuery};
use crate::web::models::recipe_models::{
    AssignedOnlyQuery, IngredientResponse, NamePatchRequest, NameRequest,
};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_ingredients_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AssignedOnlyQuery>,
) -> Result<Json<Vec<IngredientResponse>>, AppError> {
    let ingredients = IngredientService::get_ingredients_by_user(
        &app_state.db_pool,
        user.id,
        query.assigned_only()?,
    )
    .await?;
    Ok(Json(
        ingredients.into_iter().map(IngredientResponse::from).collect(),
    ))
}

async fn create_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NameRequest>,
) -> Result<(StatusCode, Json<IngredientResponse>), AppError> {
    let ingredient =
        IngredientService::create_ingredient(&app_state.db_pool, user.id, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(ingredient.into())))
}

async fn get_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(ingredient_id): AppPath<i32>,
) -> Result<Json<IngredientResponse>, AppError> {
    let ingredient =
        IngredientService::get_ingredient_by_id(&app_state.db_pool, ingredient_id, user.id)
            .await?;
    Ok(Json(ingredient.into()))
}

async fn replace_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(ingredient_id): AppPath<i32>,
    AppJson(payload): AppJson<NameRequest>,
) -> Result<Json<IngredientResponse>, AppError> {
    let ingredient = IngredientService::rename_ingredient(
        &app_state.db_pool,
        ingredient_id,
        user.id,
        &payload.name,
    )
    .await?;
    Ok(Json(ingredient.into()))
}

async fn patch_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(ingredient_id): AppPath<i32>,
    AppJson(payload): AppJson<NamePatchRequest>,
) -> Result<Json<IngredientResponse>, AppError> {
    let db = &app_state.db_pool;
    let ingredient = match payload.name {
        Some(name) => {
            IngredientService::rename_ingredient(db, ingredient_id, user.id, &name).await?
        }
        None => IngredientService::get_ingredient_by_id(db, ingredient_id, user.id).await?,
    };
    Ok(Json(ingredient.into()))
}

async fn delete_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(ingredient_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    IngredientService::delete_ingredient(&app_state.db_pool, ingredient_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_ingredients_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_ingredients_handler).post(create_ingredient_handler))
        .route(
            "/{ingredient_id}",
            get(get_ingredient_handler)
                .put(replace_ingredient_handler)
                .patch(patch_ingredient_handler)
                .delete(delete_ingredient_handler),
        )
}

impl From<IngredientError> for AppError {
    fn from(err: IngredientError) -> Self {
        match err {
            IngredientError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            IngredientError::NotFound(id) => {
                AppError::NotFound(format!("Ingredient with ID {id} not found"))
            }
            IngredientError::BlankName => AppError::InvalidInput(err.to_string()),
        }
    }
}
