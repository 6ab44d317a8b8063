use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Active,
    Used,
    Revoked,
}

impl RefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStatus::Active => "active",
            RefreshStatus::Used => "used",
            RefreshStatus::Revoked => "revoked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenDoc {
    #[serde(rename = "_id")]
    pub jti: String,

    pub user_id: String,
    pub family_id: String,
    pub parent_jti: Option<String>, // set on rotation

    pub status: RefreshStatus,
    pub token_hash: String,

    pub created_at: BsonDateTime,
    pub expires_at: BsonDateTime,

    pub used_at: Option<BsonDateTime>,
    pub revoked_at: Option<BsonDateTime>,
}
