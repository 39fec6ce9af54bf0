use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::db::services::{NewRecipe, RecipeChanges, RecipeError, RecipeFilter, RecipeService};
use crate::web::extractors::{AppJson, AppPath, AppQuery};
use crate::web::models::recipe_models::{
    parse_id_list, RecipeDetailResponse, RecipeListQuery, RecipePatchRequest, RecipeRequest,
    RecipeResponse,
};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_recipes_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<RecipeListQuery>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let filter = RecipeFilter {
        tags: parse_id_list("tags", query.tags.as_deref())?,
        ingredients: parse_id_list("ingredients", query.ingredients.as_deref())?,
    };
    let recipes = RecipeService::get_recipes_by_user(&app_state.db_pool, user.id, &filter).await?;
    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

async fn create_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RecipeRequest>,
) -> Result<(StatusCode, Json<RecipeResponse>), AppError> {
    let new_recipe = NewRecipe {
        title: payload.title,
        time_minutes: payload.time_minutes,
        price_cents: payload.price.cents(),
        link: payload.link,
        tags: payload.tags,
        ingredients: payload.ingredients,
    };
    let recipe = RecipeService::create_recipe(&app_state.db_pool, user.id, new_recipe).await?;
    Ok((StatusCode::CREATED, Json(recipe.into())))
}

async fn get_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let detail = RecipeService::get_recipe_detail(&app_state.db_pool, recipe_id, user.id).await?;
    Ok(Json(detail.into()))
}

async fn replace_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
    AppJson(payload): AppJson<RecipeRequest>,
) -> Result<Json<RecipeResponse>, AppError> {
    // A full replacement also clears links that are left out of the body.
    let changes = RecipeChanges {
        title: Some(payload.title),
        time_minutes: Some(payload.time_minutes),
        price_cents: Some(payload.price.cents()),
        link: Some(payload.link),
        tags: Some(payload.tags),
        ingredients: Some(payload.ingredients),
    };
    let recipe =
        RecipeService::update_recipe(&app_state.db_pool, recipe_id, user.id, changes).await?;
    Ok(Json(recipe.into()))
}

async fn patch_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
    AppJson(payload): AppJson<RecipePatchRequest>,
) -> Result<Json<RecipeResponse>, AppError> {
    let changes = RecipeChanges {
        title: payload.title,
        time_minutes: payload.time_minutes,
        price_cents: payload.price.map(|p| p.cents()),
        link: payload.link,
        tags: payload.tags,
        ingredients: payload.ingredients,
    };
    let recipe =
        RecipeService::update_recipe(&app_state.db_pool, recipe_id, user.id, changes).await?;
    Ok(Json(recipe.into()))
}

async fn delete_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    RecipeService::delete_recipe(&app_state.db_pool, recipe_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_recipes_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_recipes_handler).post(create_recipe_handler))
        .route(
            "/{recipe_id}",
            get(get_recipe_handler)
                .put(replace_recipe_handler)
                .patch(patch_recipe_handler)
                .delete(delete_recipe_handler),
        )
}

impl From<RecipeError> for AppError {
    fn from(err: RecipeError) -> Self {
        match err {
            RecipeError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            RecipeError::NotFound(id) => {
                AppError::NotFound(format!("Recipe with ID {id} not found"))
            }
            RecipeError::BlankTitle
            | RecipeError::NegativeTime
            | RecipeError::PriceOutOfRange
            | RecipeError::UnknownTags(_)
            | RecipeError::UnknownIngredients(_) => AppError::InvalidInput(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::db::entities::prelude::Recipe;
    use crate::db::services::{IngredientService, NewRecipe, RecipeService, TagService};
    use crate::test_support::{self, TestApp};
    use sea_orm::EntityTrait;

    const RECIPES_URL: &str = "/api/recipe/recipes";

    fn detail_url(recipe_id: i32) -> String {
        format!("{RECIPES_URL}/{recipe_id}")
    }

    #[tokio::test]
    async fn login_required() {
        let app = TestApp::new().await;
        let (status, _) = app.request(Method::GET, RECIPES_URL, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn retrieve_recipes() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;
        let first = RecipeService::create_recipe(&app.db, user.id, NewRecipe::sample("sample recipe"))
            .await
            .unwrap();
        let second = RecipeService::create_recipe(&app.db, user.id, NewRecipe::sample("sample recipe"))
            .await
            .unwrap();

        let (status, body) = app.request(Method::GET, RECIPES_URL, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {
                    "id": second.recipe.id,
                    "title": "sample recipe",
                    "time_minutes": 10,
                    "price": "5.00",
                    "link": null,
                    "tags": [],
                    "ingredients": []
                },
                {
                    "id": first.recipe.id,
                    "title": "sample recipe",
                    "time_minutes": 10,
                    "price": "5.00",
                    "link": null,
                    "tags": [],
                    "ingredients": []
                },
            ])
        );
    }

    #[tokio::test]
    async fn recipes_limited_to_user() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;
        let other = test_support::create_user(&app.db, "test2@test.com", "test123123").await;
        RecipeService::create_recipe(&app.db, other.id, NewRecipe::sample("theirs"))
            .await
            .unwrap();
        let mine = RecipeService::create_recipe(&app.db, user.id, NewRecipe::sample("mine"))
            .await
            .unwrap();

        let (status, body) = app.request(Method::GET, RECIPES_URL, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let recipes = body.as_array().unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0]["id"], mine.recipe.id);
    }

    #[tokio::test]
    async fn create_basic_recipe() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;

        let payload = json!({ "title": "Chocolate cheesecake", "time_minutes": 30, "price": 5.00 });
        let (status, body) = app
            .request(Method::POST, RECIPES_URL, Some(&token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "Chocolate cheesecake");
        assert_eq!(body["price"], "5.00");

        let stored = Recipe::find().one(&app.db).await.unwrap().unwrap();
        assert_eq!(stored.user_id, user.id);
        assert_eq!(stored.time_minutes, 30);
        assert_eq!(stored.price_cents, 500);
    }

    #[tokio::test]
    async fn create_recipe_with_tags_and_ingredients() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;
        let vegan = TagService::create_tag(&app.db, user.id, "Vegan").await.unwrap();
        let dessert = TagService::create_tag(&app.db, user.id, "Dessert").await.unwrap();
        let prawns = IngredientService::create_ingredient(&app.db, user.id, "Prawns")
            .await
            .unwrap();

        let payload = json!({
            "title": "Avocado lime cheesecake",
            "time_minutes": 60,
            "price": "20.00",
            "tags": [vegan.id, dessert.id],
            "ingredients": [prawns.id]
        });
        let (status, body) = app
            .request(Method::POST, RECIPES_URL, Some(&token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let recipe_id = body["id"].as_i64().unwrap() as i32;
        let (status, detail) = app
            .request(Method::GET, &detail_url(recipe_id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            detail["tags"],
            json!([
                { "id": vegan.id, "name": "Vegan" },
                { "id": dessert.id, "name": "Dessert" },
            ])
        );
        assert_eq!(detail["ingredients"], json!([{ "id": prawns.id, "name": "Prawns" }]));
    }

    #[tokio::test]
    async fn invalid_recipe_payloads_are_rejected() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with_token("test@test.com").await;

        let cases = [
            json!({ "title": "", "time_minutes": 5, "price": 1 }),
            json!({ "title": "No time", "price": 1 }),
            json!({ "title": "Bad price", "time_minutes": 5, "price": "1.999" }),
            json!({ "title": "Too dear", "time_minutes": 5, "price": 1000 }),
            json!({ "title": "Ghost tag", "time_minutes": 5, "price": 1, "tags": [4242] }),
        ];
        for payload in cases {
            let (status, _) = app
                .request(Method::POST, RECIPES_URL, Some(&token), Some(payload.clone()))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload: {payload}");
        }
        assert!(Recipe::find().one(&app.db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_update_recipe() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;
        let spicy = TagService::create_tag(&app.db, user.id, "Spicy").await.unwrap();
        let curry = TagService::create_tag(&app.db, user.id, "Curry").await.unwrap();
        let recipe = RecipeService::create_recipe(
            &app.db,
            user.id,
            NewRecipe {
                tags: vec![spicy.id],
                ..NewRecipe::sample("Chicken tikka")
            },
        )
        .await
        .unwrap();

        let payload = json!({ "title": "Chicken tikka masala", "tags": [curry.id] });
        let (status, body) = app
            .request(Method::PATCH, &detail_url(recipe.recipe.id), Some(&token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Chicken tikka masala");
        assert_eq!(body["time_minutes"], 10);
        assert_eq!(body["tags"], json!([curry.id]));
    }

    #[tokio::test]
    async fn full_update_recipe() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;
        let pasta = TagService::create_tag(&app.db, user.id, "Pasta").await.unwrap();
        let recipe = RecipeService::create_recipe(
            &app.db,
            user.id,
            NewRecipe {
                tags: vec![pasta.id],
                link: Some("https://example.com/carbonara".to_string()),
                ..NewRecipe::sample("Spaghetti carbonara")
            },
        )
        .await
        .unwrap();

        let payload = json!({ "title": "Spaghetti aglio e olio", "time_minutes": 25, "price": 5 });
        let (status, body) = app
            .request(Method::PUT, &detail_url(recipe.recipe.id), Some(&token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Spaghetti aglio e olio");
        assert_eq!(body["time_minutes"], 25);
        assert_eq!(body["price"], "5.00");
        assert_eq!(body["link"], serde_json::Value::Null);
        assert_eq!(body["tags"], json!([]));
    }

    #[tokio::test]
    async fn filter_recipes_by_tags_and_ingredients() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;
        let vegan = TagService::create_tag(&app.db, user.id, "Vegan").await.unwrap();
        let veggie = TagService::create_tag(&app.db, user.id, "Vegetarian").await.unwrap();
        let feta = IngredientService::create_ingredient(&app.db, user.id, "Feta cheese")
            .await
            .unwrap();

        let curry = RecipeService::create_recipe(
            &app.db,
            user.id,
            NewRecipe {
                tags: vec![vegan.id],
                ..NewRecipe::sample("Thai vegetable curry")
            },
        )
        .await
        .unwrap();
        let tahini = RecipeService::create_recipe(
            &app.db,
            user.id,
            NewRecipe {
                tags: vec![veggie.id],
                ingredients: vec![feta.id],
                ..NewRecipe::sample("Aubergine with tahini")
            },
        )
        .await
        .unwrap();
        RecipeService::create_recipe(&app.db, user.id, NewRecipe::sample("Fish and chips"))
            .await
            .unwrap();

        let url = format!("{RECIPES_URL}?tags={},{}", vegan.id, veggie.id);
        let (status, body) = app.request(Method::GET, &url, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![tahini.recipe.id as i64, curry.recipe.id as i64]);

        let url = format!("{RECIPES_URL}?ingredients={}", feta.id);
        let (_, body) = app.request(Method::GET, &url, Some(&token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], tahini.recipe.id);

        let url = format!("{RECIPES_URL}?tags=abc");
        let (status, _) = app.request(Method::GET, &url, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn other_users_recipe_is_not_found() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with_token("test@test.com").await;
        let other = test_support::create_user(&app.db, "test2@test.com", "test123123").await;
        let recipe = RecipeService::create_recipe(&app.db, other.id, NewRecipe::sample("Secret"))
            .await
            .unwrap();
        let url = detail_url(recipe.recipe.id);

        let (status, _) = app.request(Method::GET, &url, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .request(Method::PATCH, &url, Some(&token), Some(json!({ "title": "Mine" })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.request(Method::DELETE, &url, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_own_recipe() {
        let app = TestApp::new().await;
        let (user, token) = app.user_with_token("test@test.com").await;
        let recipe = RecipeService::create_recipe(&app.db, user.id, NewRecipe::sample("Leftovers"))
            .await
            .unwrap();

        let (status, _) = app
            .request(Method::DELETE, &detail_url(recipe.recipe.id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(Recipe::find().one(&app.db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_recipe_id_is_a_json_error() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with_token("test@test.com").await;

        let (status, body) = app
            .request(Method::DELETE, &format!("{RECIPES_URL}/abc"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
