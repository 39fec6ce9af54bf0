use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::db::services::{TagError, TagService};
use crate::web::extractors::{AppJson, AppPath, AppQuery};
use crate::web::models::recipe_models::{
    AssignedOnlyQuery, NamePatchRequest, NameRequest, TagResponse,
};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_tags_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<AssignedOnlyQuery>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = TagService::get_tags_by_user(
        &app_state.db_pool,
        authenticated_user.id,
        query.assigned_only()?,
    )
    .await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

async fn create_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NameRequest>,
) -> Result<(StatusCode, Json<TagResponse>), AppError> {
    let tag =
        TagService::create_tag(&app_state.db_pool, authenticated_user.id, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

async fn get_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = TagService::get_tag_by_id(&app_state.db_pool, tag_id, authenticated_user.id).await?;
    Ok(Json(tag.into()))
}

async fn replace_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
    AppJson(payload): AppJson<NameRequest>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = TagService::rename_tag(
        &app_state.db_pool,
        tag_id,
        authenticated_user.id,
        &payload.name,
    )
    .await?;
    Ok(Json(tag.into()))
}

async fn patch_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
    AppJson(payload): AppJson<NamePatchRequest>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = match payload.name {
        Some(name) => {
            TagService::rename_tag(&app_state.db_pool, tag_id, authenticated_user.id, &name)
                .await?
        }
        None => {
            TagService::get_tag_by_id(&app_state.db_pool, tag_id, authenticated_user.id).await?
        }
    };
    Ok(Json(tag.into()))
}

async fn delete_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(tag_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    TagService::delete_tag(&app_state.db_pool, tag_id, authenticated_user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tags_handler).post(create_tag_handler))
        .route(
            "/{tag_id}",
            get(get_tag_handler)
                .put(replace_tag_handler)
                .patch(patch_tag_handler)
                .delete(delete_tag_handler),
        )
}

impl From<TagError> for AppError {
    fn from(err: TagError) -> Self {
        match err {
            TagError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            TagError::NotFound(_) => AppError::NotFound(err.to_string()),
            TagError::BlankName => AppError::InvalidInput(err.to_string()),
        }
    }
}
