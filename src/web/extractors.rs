//! Request extractors whose rejections render as `AppError`, so malformed bodies,
//! query strings and path ids get the same `{"error": ...}` 400 shape as
//! validation failures.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;

use crate::web::error::AppError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);
