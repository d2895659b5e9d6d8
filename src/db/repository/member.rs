use sqlx::SqlitePool;

use crate::db::models::Member;
use crate::error::{AppError, AppResult};

// ============================================================================
// Member Repository
// ============================================================================

pub struct MemberRepository;

impl MemberRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Member>> {
        sqlx::query_as::<_, Member>(
            r#"
            SELECT
                id, family_id, username, first_name, last_name, role,
                avatar, color, created_at, updated_at
            FROM members
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// All login accounts of a family, in a stable display order.
    pub async fn list_by_family(pool: &SqlitePool, family_id: &str) -> AppResult<Vec<Member>> {
        sqlx::query_as::<_, Member>(
            r#"
            SELECT
                id, family_id, username, first_name, last_name, role,
                avatar, color, created_at, updated_at
            FROM members
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
