use chrono::NaiveDateTime;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::{LocationSample, LocationSampleRepository, NewLocationSample};
use crate::error::AppResult;
use crate::services::geodesy::Coordinate;

/// Samples kept per subject. Older ones are trimmed on every append.
pub const MAX_SAMPLES_PER_SUBJECT: i64 = 10;

/// Bounded per-subject location history.
///
/// Appends take a connection (usually a transaction) so the insert and the
/// trim commit together; readers never see more than
/// `MAX_SAMPLES_PER_SUBJECT` rows for a subject.
pub struct LocationLedger;

impl LocationLedger {
    pub async fn append(
        conn: &mut SqliteConnection,
        subject_id: &str,
        position: Coordinate,
        accuracy: Option<f64>,
        now: NaiveDateTime,
    ) -> AppResult<LocationSample> {
        let sample = LocationSampleRepository::insert(
            &mut *conn,
            &Self::new_sample(subject_id, position, accuracy, now),
        )
        .await?;
        Self::trim(conn, subject_id).await?;
        Ok(sample)
    }

    /// Append only if the subject is live at `now`. `None` means the write
    /// was refused and nothing changed.
    pub async fn append_while_sharing(
        conn: &mut SqliteConnection,
        subject_id: &str,
        position: Coordinate,
        accuracy: Option<f64>,
        now: NaiveDateTime,
    ) -> AppResult<Option<LocationSample>> {
        let inserted = LocationSampleRepository::insert_while_sharing(
            &mut *conn,
            &Self::new_sample(subject_id, position, accuracy, now),
            now,
        )
        .await?;

        if inserted.is_some() {
            Self::trim(conn, subject_id).await?;
        }
        Ok(inserted)
    }

    pub async fn latest(pool: &SqlitePool, subject_id: &str) -> AppResult<Option<LocationSample>> {
        LocationSampleRepository::latest_for_subject(pool, subject_id).await
    }

    async fn trim(conn: &mut SqliteConnection, subject_id: &str) -> AppResult<()> {
        let removed =
            LocationSampleRepository::trim(conn, subject_id, MAX_SAMPLES_PER_SUBJECT).await?;
        if removed > 0 {
            tracing::trace!("Trimmed {} old samples of {}", removed, subject_id);
        }
        Ok(())
    }

    fn new_sample(
        subject_id: &str,
        position: Coordinate,
        accuracy: Option<f64>,
        now: NaiveDateTime,
    ) -> NewLocationSample {
        NewLocationSample {
            subject_id: subject_id.to_string(),
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy,
            recorded_at: now,
        }
    }
}
