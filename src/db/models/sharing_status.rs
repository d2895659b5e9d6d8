use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "snake_case")]
pub enum SharingMode {
    OneTime,
    Temporary,
    Always,
}

/// Stored sharing consent of one member.
///
/// The stored `is_live` flag may lag behind reality (an elapsed temporary
/// session the sweeper has not reached yet, or a one-time grant). Never
/// expose it directly; go through `services::sharing::SharingState`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SharingStatus {
    pub user_id: String,
    pub mode: SharingMode,
    pub is_live: bool,
    /// Only set for `SharingMode::Temporary`.
    pub expires_at: Option<NaiveDateTime>,
    /// When the member explicitly stopped. Distinguishes a stop from an
    /// expiry once `is_live` has been cleared.
    pub stopped_at: Option<NaiveDateTime>,
    pub started_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
