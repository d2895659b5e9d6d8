use chrono::NaiveDateTime;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::models::{LocationSample, NewLocationSample};
use crate::error::{AppError, AppResult};

/// Repository for the bounded per-subject location history.
///
/// Writes take a `&mut SqliteConnection` so callers can run insert + trim
/// (and any status change that goes with them) inside one transaction.
pub struct LocationSampleRepository;

impl LocationSampleRepository {
    pub async fn insert(
        conn: &mut SqliteConnection,
        sample: &NewLocationSample,
    ) -> AppResult<LocationSample> {
        let id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, LocationSample>(
            r#"
            INSERT INTO location_samples (
                id, subject_id, latitude, longitude, accuracy, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, subject_id, latitude, longitude, accuracy, recorded_at
            "#,
        )
        .bind(id)
        .bind(&sample.subject_id)
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.accuracy)
        .bind(sample.recorded_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::Database)
    }

    /// Insert only if the subject currently has a live temporary (not yet
    /// expired at `now`) or always-on session. The status check and the
    /// insert are one statement, so a concurrent stop or expiry either
    /// happens before (nothing inserted) or after (sample accepted).
    ///
    /// Returns `None` when the guard rejected the insert.
    pub async fn insert_while_sharing(
        conn: &mut SqliteConnection,
        sample: &NewLocationSample,
        now: NaiveDateTime,
    ) -> AppResult<Option<LocationSample>> {
        let id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, LocationSample>(
            r#"
            INSERT INTO location_samples (
                id, subject_id, latitude, longitude, accuracy, recorded_at
            )
            SELECT ?, ?, ?, ?, ?, ?
            WHERE EXISTS (
                SELECT 1 FROM sharing_statuses
                WHERE user_id = ?
                  AND is_live = 1
                  AND (
                      mode = 'always'
                      OR (mode = 'temporary' AND expires_at IS NOT NULL AND expires_at >= ?)
                  )
            )
            RETURNING id, subject_id, latitude, longitude, accuracy, recorded_at
            "#,
        )
        .bind(id)
        .bind(&sample.subject_id)
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.accuracy)
        .bind(sample.recorded_at)
        .bind(&sample.subject_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::Database)
    }

    /// Delete everything but the `keep` most recent samples of a subject.
    /// Insertion order breaks ties between identical timestamps.
    pub async fn trim(conn: &mut SqliteConnection, subject_id: &str, keep: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM location_samples
            WHERE subject_id = ?
              AND id NOT IN (
                  SELECT id FROM location_samples
                  WHERE subject_id = ?
                  ORDER BY recorded_at DESC, rowid DESC
                  LIMIT ?
              )
            "#,
        )
        .bind(subject_id)
        .bind(subject_id)
        .bind(keep)
        .execute(&mut *conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    pub async fn latest_for_subject(
        pool: &SqlitePool,
        subject_id: &str,
    ) -> AppResult<Option<LocationSample>> {
        sqlx::query_as::<_, LocationSample>(
            r#"
            SELECT id, subject_id, latitude, longitude, accuracy, recorded_at
            FROM location_samples
            WHERE subject_id = ?
            ORDER BY recorded_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(subject_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}
