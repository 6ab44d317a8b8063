use async_trait::async_trait;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    options::{ClientOptions, IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};

use super::{ConsumeOutcome, CredentialStore, StoreError, UserStore};
use crate::models::{
    refresh_token::{RefreshStatus, RefreshTokenDoc},
    user::UserDoc,
};

#[derive(Clone)]
pub struct MongoStore {
    users: Collection<UserDoc>,
    refresh_tokens: Collection<RefreshTokenDoc>,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let mut opts = ClientOptions::parse(uri).await?;
        opts.app_name = Some("session-auth".to_string());
        let client = Client::with_options(opts)?;
        let db = client.database(db_name);
        let users: Collection<UserDoc> = db.collection("users");
        let refresh_tokens: Collection<RefreshTokenDoc> = db.collection("refresh_tokens");

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        users.create_index(email_index).await?;

        let hash_index = IndexModel::builder()
            .keys(doc! { "token_hash": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        refresh_tokens.create_index(hash_index).await?;

        // revoke_family / revoke_subject only touch still-active rows
        let family_index = IndexModel::builder()
            .keys(doc! { "family_id": 1, "status": 1 })
            .build();
        refresh_tokens.create_index(family_index).await?;
        let subject_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "status": 1 })
            .build();
        refresh_tokens.create_index(subject_index).await?;

        Ok(Self {
            users,
            refresh_tokens,
        })
    }
}

#[async_trait]
impl CredentialStore for MongoStore {
    async fn try_consume(&self, jti: &str) -> Result<ConsumeOutcome, StoreError> {
        // single-document conditional update; the filter on status is what
        // serializes concurrent consumers
        let previous = self
            .refresh_tokens
            .find_one_and_update(
                doc! { "_id": jti, "status": RefreshStatus::Active.as_str() },
                doc! { "$set": {
                    "status": RefreshStatus::Used.as_str(),
                    "used_at": BsonDateTime::now(),
                }},
            )
            .return_document(ReturnDocument::Before)
            .await?;

        if let Some(previous) = previous {
            return Ok(ConsumeOutcome::Consumed(previous));
        }

        // zero rows: unknown, or already spent
        match self.refresh_tokens.find_one(doc! { "_id": jti }).await? {
            Some(existing) => Ok(ConsumeOutcome::AlreadySpent(existing)),
            None => Ok(ConsumeOutcome::Unknown),
        }
    }

    async fn insert_active(&self, record: RefreshTokenDoc) -> Result<(), StoreError> {
        let record = RefreshTokenDoc {
            status: RefreshStatus::Active,
            ..record
        };
        self.refresh_tokens.insert_one(record).await?;
        Ok(())
    }

    async fn find(&self, jti: &str) -> Result<Option<RefreshTokenDoc>, StoreError> {
        Ok(self.refresh_tokens.find_one(doc! { "_id": jti }).await?)
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError> {
        let res = self
            .refresh_tokens
            .update_many(
                doc! { "family_id": family_id, "status": RefreshStatus::Active.as_str() },
                doc! { "$set": {
                    "status": RefreshStatus::Revoked.as_str(),
                    "revoked_at": BsonDateTime::now(),
                }},
            )
            .await?;
        Ok(res.modified_count)
    }

    async fn revoke_subject(&self, subject_id: &str) -> Result<u64, StoreError> {
        let res = self
            .refresh_tokens
            .update_many(
                doc! { "user_id": subject_id, "status": RefreshStatus::Active.as_str() },
                doc! { "$set": {
                    "status": RefreshStatus::Revoked.as_str(),
                    "revoked_at": BsonDateTime::now(),
                }},
            )
            .await?;
        Ok(res.modified_count)
    }

    async fn bump_generation(&self, subject_id: &str) -> Result<i64, StoreError> {
        let id = ObjectId::parse_str(subject_id).map_err(|_| StoreError::NotFound)?;
        let user = self
            .users
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$inc": { "token_generation": 1i64 } },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(user.token_generation)
    }

    async fn get_generation(&self, subject_id: &str) -> Result<Option<i64>, StoreError> {
        let Ok(id) = ObjectId::parse_str(subject_id) else {
            return Ok(None);
        };
        Ok(self
            .users
            .find_one(doc! { "_id": id })
            .await?
            .map(|u| u.token_generation))
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn create(&self, user: UserDoc) -> Result<(), StoreError> {
        self.users.insert_one(&user).await.map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate("user already exists".into()),
            other => other,
        })?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }
}
