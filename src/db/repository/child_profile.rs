use sqlx::SqlitePool;

use crate::db::models::ChildProfile;
use crate::error::{AppError, AppResult};

pub struct ChildProfileRepository;

impl ChildProfileRepository {
    /// Child profiles of a family, in a stable display order.
    pub async fn list_by_family(
        pool: &SqlitePool,
        family_id: &str,
    ) -> AppResult<Vec<ChildProfile>> {
        sqlx::query_as::<_, ChildProfile>(
            r#"
            SELECT
                id, family_id, first_name, last_name, linked_user_id, manager_id,
                avatar, color, created_at, updated_at
            FROM child_profiles
            WHERE family_id = ?
            ORDER BY first_name ASC, last_name ASC, id ASC
            "#,
        )
        .bind(family_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
