use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for users
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRow {
    /// Surrogate key; owner id of the user's sessions. Never exposed.
    pub id: i64,
    pub employee_id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, `None` until the account is activated.
    pub password: Option<String>,
    pub designation: String,
    pub is_activated: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn to_shared(&self) -> shared::User {
        shared::User {
            employee_id: self.employee_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            designation: self.designation.clone(),
            is_activated: self.is_activated,
            created_at: self.created_at,
        }
    }
}
