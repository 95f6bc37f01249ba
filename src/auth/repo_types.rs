use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_ROLE: &str = "user";

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                   // store-assigned user ID
    pub email: String,              // unique, lowercase
    pub name: String,
    pub last_name: Option<String>,
    pub member_number: Option<i64>, // unique when present
    #[serde(skip_serializing)]
    pub password_hash: String,      // Argon2 PHC string, not exposed in JSON
    pub is_active: bool,
    pub roles: Vec<String>,
    pub created_at: OffsetDateTime, // creation timestamp
}

/// Row to insert; `id`, `is_active` and `created_at` are assigned by the store.
#[derive(Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub name: String,
    pub last_name: Option<String>,
    pub member_number: Option<i64>,
    pub password_hash: String,
    pub roles: Vec<String>,
}

impl std::fmt::Debug for NewUserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUserRecord")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("member_number", &self.member_number)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}
