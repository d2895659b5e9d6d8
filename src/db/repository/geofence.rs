use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Geofence, NewGeofence};
use crate::error::{AppError, AppResult};

pub struct GeofenceRepository;

impl GeofenceRepository {
    /// Fences of a family, alphabetically by name ignoring case. This is the order the
    /// matcher walks, so it decides which fence wins when zones overlap.
    pub async fn list_by_family(pool: &SqlitePool, family_id: &str) -> AppResult<Vec<Geofence>> {
        sqlx::query_as::<_, Geofence>(
            r#"
            SELECT id, family_id, name, latitude, longitude, radius, created_by, created_at
            FROM geofences
            WHERE family_id = ?
            ORDER BY name COLLATE NOCASE ASC, id ASC
            "#,
        )
        .bind(family_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Insert a fence. A duplicate name within the family is a `Conflict`.
    pub async fn create(
        pool: &SqlitePool,
        fence: &NewGeofence,
        radius: f64,
        now: chrono::NaiveDateTime,
    ) -> AppResult<Geofence> {
        let id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, Geofence>(
            r#"
            INSERT INTO geofences (
                id, family_id, name, latitude, longitude, radius, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, family_id, name, latitude, longitude, radius, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(&fence.family_id)
        .bind(&fence.name)
        .bind(fence.latitude)
        .bind(fence.longitude)
        .bind(radius)
        .bind(&fence.created_by)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false);
            if duplicate {
                AppError::Conflict(format!(
                    "A geofence named '{}' already exists in this family",
                    fence.name
                ))
            } else {
                AppError::Database(e)
            }
        })
    }

    /// Delete a fence belonging to `family_id`. Returns `false` if no such
    /// fence exists in that family.
    pub async fn delete(pool: &SqlitePool, family_id: &str, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM geofences WHERE id = ? AND family_id = ?")
            .bind(id)
            .bind(family_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
