use chrono::NaiveDateTime;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::db::models::{SharingMode, SharingStatus};
use crate::error::{AppError, AppResult};

/// Repository for per-member sharing state.
///
/// Every transition is a single conditional `UPDATE`/upsert so concurrent
/// writers (the member's own requests, family reads doing eager expiry and
/// the sweeper) never interleave inside a row. All expiring writes only move
/// a row toward "not live", so last-write-wins between them is harmless.
pub struct SharingStatusRepository;

impl SharingStatusRepository {
    pub async fn find_by_user<'e, E>(executor: E, user_id: &str) -> AppResult<Option<SharingStatus>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, SharingStatus>(
            r#"
            SELECT user_id, mode, is_live, expires_at, stopped_at, started_at, updated_at
            FROM sharing_statuses
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Create or replace the member's status with a freshly started session.
    pub async fn start_session<'e, E>(
        executor: E,
        user_id: &str,
        mode: SharingMode,
        is_live: bool,
        expires_at: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> AppResult<SharingStatus>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, SharingStatus>(
            r#"
            INSERT INTO sharing_statuses (
                user_id, mode, is_live, expires_at, stopped_at, started_at, updated_at
            ) VALUES (?, ?, ?, ?, NULL, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                mode = excluded.mode,
                is_live = excluded.is_live,
                expires_at = excluded.expires_at,
                stopped_at = NULL,
                started_at = excluded.started_at,
                updated_at = excluded.updated_at
            RETURNING user_id, mode, is_live, expires_at, stopped_at, started_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(mode)
        .bind(is_live)
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Unconditionally mark the member as not live and record the stop.
    /// Returns `None` when the member never shared.
    pub async fn stop(
        pool: &SqlitePool,
        user_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<SharingStatus>> {
        sqlx::query_as::<_, SharingStatus>(
            r#"
            UPDATE sharing_statuses
            SET is_live = 0, stopped_at = ?, updated_at = ?
            WHERE user_id = ?
            RETURNING user_id, mode, is_live, expires_at, stopped_at, started_at, updated_at
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Compare-and-set expiry for a single member: flips `is_live` only if the
    /// row is still a live temporary session whose expiry has passed.
    ///
    /// Returns `true` when this call performed the flip.
    pub async fn expire_if_elapsed(
        pool: &SqlitePool,
        user_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sharing_statuses
            SET is_live = 0, updated_at = ?
            WHERE user_id = ?
              AND mode = 'temporary'
              AND is_live = 1
              AND (expires_at IS NULL OR expires_at < ?)
            "#,
        )
        .bind(now)
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Bulk expiry used by the sweeper. Returns the number of sessions closed.
    pub async fn expire_all_elapsed(pool: &SqlitePool, now: NaiveDateTime) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sharing_statuses
            SET is_live = 0, updated_at = ?
            WHERE mode = 'temporary'
              AND is_live = 1
              AND (expires_at IS NULL OR expires_at < ?)
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
