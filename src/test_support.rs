//! Shared fixtures for unit and HTTP tests: an in-memory SQLite database with the
//! schema applied, and a router wrapper that speaks JSON.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::db::entities::user;
use crate::db::schema;
use crate::db::services::{TokenService, UserExtra, UserService};
use crate::server::config::ServerConfig;
use crate::web::create_axum_router;

/// Lowest cost bcrypt accepts; keeps hashing fast in tests.
pub const TEST_BCRYPT_COST: u32 = 4;

pub const TEST_PASSWORD: &str = "test123123";

pub async fn test_db() -> DatabaseConnection {
    // Every pooled connection would get its own `:memory:` database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    schema::create_tables(&db).await.unwrap();
    db
}

pub fn test_config() -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
        database_url: "sqlite::memory:".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        log_dir: "logs".to_string(),
        password_min_length: 5,
        bcrypt_cost: TEST_BCRYPT_COST,
    })
}

pub async fn create_user(db: &DatabaseConnection, email: &str, password: &str) -> user::Model {
    UserService::create_user(db, email, password, UserExtra::default(), TEST_BCRYPT_COST)
        .await
        .unwrap()
}

pub struct TestApp {
    pub db: DatabaseConnection,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = test_db().await;
        let router = create_axum_router(db.clone(), test_config());
        TestApp { db, router }
    }

    /// Creates a user and returns it along with a valid API token.
    pub async fn user_with_token(&self, email: &str) -> (user::Model, String) {
        let user = create_user(&self.db, email, TEST_PASSWORD).await;
        let token = TokenService::get_or_create(&self.db, user.id).await.unwrap();
        (user, token)
    }

    pub async fn raw_request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.call(builder.body(body).unwrap()).await
    }

    pub async fn call(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends a JSON request and decodes the response.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.raw_request(method, uri, token, body).await;
        decode(response).await
    }
}

/// Splits a response into its status and decoded body. An empty body decodes to
/// `null` and a non-JSON body to a string.
pub async fn decode(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}
