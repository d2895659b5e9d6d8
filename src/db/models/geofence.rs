use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Geofence {
    pub id: String,
    pub family_id: String,
    /// Unique within the family; shown instead of coordinates when matched.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewGeofence {
    pub family_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_by: String,
}
