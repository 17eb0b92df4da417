use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::UserView;

/// Request body for user registration.
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "fullname", default)]
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Request body for login.
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    pub user: UserView,
    pub access_token: String,
}

/// Identity carried by a validated bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}
