//! Table bootstrap derived from the entity definitions.
//!
//! Tables are created in foreign-key order and only if they are missing, so
//! running this against an already initialised database is a no-op.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Schema};
use tracing::{debug, info};

use crate::db::entities::prelude::*;

pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(AuthToken),
        schema.create_table_from_entity(Tag),
        schema.create_table_from_entity(Ingredient),
        schema.create_table_from_entity(Recipe),
        schema.create_table_from_entity(RecipeTag),
        schema.create_table_from_entity(RecipeIngredient),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        let sql = backend.build(&*statement);
        debug!(sql = %sql.sql, "Ensuring table exists.");
        db.execute(sql).await?;
    }

    info!(tables = statements.len(), "Database schema is up to date.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn create_tables_is_idempotent() {
        let db = test_support::test_db().await;
        // test_db already ran it once.
        create_tables(&db).await.unwrap();
    }
}
