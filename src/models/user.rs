use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Generation counters start here and only ever go up.
pub const INITIAL_GENERATION: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,
    pub name: String,

    pub password_hash: String,
    pub created_at: BsonDateTime,

    pub token_generation: i64,
}

impl UserDoc {
    pub fn subject_id(&self) -> String {
        self.id.to_hex()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPublic {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

impl From<UserDoc> for UserPublic {
    fn from(u: UserDoc) -> Self {
        Self {
            id: u.id.to_hex(),
            email: u.email,
            name: u.name,
            created_at: bson_to_rfc3339(u.created_at),
        }
    }
}

fn bson_to_rfc3339(dt: BsonDateTime) -> String {
    let ms = dt.timestamp_millis();
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH)
        .to_rfc3339()
}
