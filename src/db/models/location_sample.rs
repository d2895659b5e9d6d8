use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded position. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LocationSample {
    pub id: String,
    /// The member whose device reported the position.
    pub subject_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters.
    pub accuracy: Option<f64>,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewLocationSample {
    pub subject_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub recorded_at: NaiveDateTime,
}
