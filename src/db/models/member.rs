use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role of a login account. Stored in a single column; there is no other
/// place a member's role is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Parent,
    /// Login account belonging to a child. The child is represented in the
    /// family view through its `ChildProfile`, never through this account.
    ChildUser,
}

impl Role {
    pub fn can_manage_geofences(self) -> bool {
        matches!(self, Role::Parent)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub family_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub color: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Member {
    /// "First Last", or the username when both names are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}
