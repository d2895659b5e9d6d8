use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A child as the family sees it. Locations are never recorded against the
/// profile itself, only against `linked_user_id` when the child has a login.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChildProfile {
    pub id: String,
    pub family_id: String,
    pub first_name: String,
    pub last_name: String,
    pub linked_user_id: Option<String>,
    pub manager_id: String,
    pub avatar: Option<String>,
    pub color: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ChildProfile {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.first_name.clone()
        } else {
            full.to_string()
        }
    }
}
