use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload binding a user to a validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,        // user ID
    pub username: String,
    pub email: String,
    pub iat: i64,         // issued at (unix timestamp)
    pub nbf: i64,         // not before
    pub exp: i64,         // expires at
    pub iss: String,      // issuer
}
