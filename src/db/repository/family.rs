use sqlx::SqlitePool;

use crate::db::models::Family;
use crate::error::{AppError, AppResult};

pub struct FamilyRepository;

impl FamilyRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Family>> {
        sqlx::query_as::<_, Family>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM families
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}
