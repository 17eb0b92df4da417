use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,        // unique, case-sensitive
    pub email: String,           // unique
    pub password_hash: String,   // Argon2 PHC string, never leaves the auth module
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub public_repos_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Row to insert; the store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

/// Public part of the user returned to callers. Has no password hash field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "fullname")]
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub public_repos_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            bio: u.bio,
            avatar_url: u.avatar_url,
            public_repos_count: u.public_repos_count,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
