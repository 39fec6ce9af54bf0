//! The `services` module provides a high-level API for interacting with the database.
//! It encapsulates the query logic and data access patterns, so HTTP handlers work
//! with domain models without knowing about the underlying schema.
//!
//! Every query on an owned record filters by the caller's user id; a record owned by
//! someone else is reported exactly like a missing one.

pub mod ingredient_service;
pub mod recipe_service;
pub mod tag_service;
pub mod token_service;
pub mod user_service;

// Re-export the public API of the sub-modules under `crate::db::services::*`.
pub use ingredient_service::*;
pub use recipe_service::*;
pub use tag_service::*;
pub use token_service::*;
pub use user_service::*;
