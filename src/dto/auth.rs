use serde::{Deserialize, Serialize};

use crate::{auth::tokens::IssuedTokens, models::user::UserPublic};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserPublic,
    #[serde(flatten)]
    pub tokens: IssuedTokens,
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub status: &'static str,
}
