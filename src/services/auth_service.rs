use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use tracing::warn;

use crate::{
    auth::tokens::IssuedTokens,
    cache::profile_key,
    dto::auth::{LoginRequest, RegisterRequest},
    errors::AppError,
    models::user::{UserDoc, UserPublic, INITIAL_GENERATION},
    password::{hash_password, verify_password},
    state::AppState,
};

pub struct RegisterOutput {
    pub user: UserPublic,
    pub tokens: IssuedTokens,
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<RegisterOutput, AppError> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();

    if email.is_empty() || name.is_empty() {
        return Err(AppError::Validation("email/name required".into()));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("user already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;

    let user = UserDoc {
        id: ObjectId::new(),
        email,
        name,
        password_hash,
        created_at: BsonDateTime::now(),
        token_generation: INITIAL_GENERATION,
    };
    let subject_id = user.subject_id();

    state.users.create(user.clone()).await?;

    let tokens = state.sessions.login(&subject_id).await?;

    Ok(RegisterOutput {
        user: UserPublic::from(user),
        tokens,
    })
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<IssuedTokens, AppError> {
    let email = req.email.trim().to_lowercase();

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    state.sessions.login(&user.subject_id()).await
}

/// Profile lookup through the cache; the cache is best-effort both ways.
pub async fn me(state: &AppState, subject_id: &str) -> Result<UserPublic, AppError> {
    let key = profile_key(subject_id);

    match state.cache.get(&key).await {
        Ok(Some(cached)) => match serde_json::from_str::<UserPublic>(&cached) {
            Ok(profile) => return Ok(profile),
            Err(e) => warn!(subject = subject_id, error = %e, "dropping unreadable cached profile"),
        },
        Ok(None) => {}
        Err(e) => warn!(subject = subject_id, error = %e, "profile cache read failed"),
    }

    let user_id = ObjectId::parse_str(subject_id).map_err(|_| AppError::Unauthorized)?;
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let profile = UserPublic::from(user);

    match serde_json::to_string(&profile) {
        Ok(json) => {
            if let Err(e) = state.cache.set(&key, &json, state.cfg.profile_cache_ttl).await {
                warn!(subject = subject_id, error = %e, "profile cache write failed");
            }
        }
        Err(e) => warn!(subject = subject_id, error = %e, "profile not cacheable"),
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::KvCache, testutil::test_state};

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            name: "Ada".into(),
            password: "correct horse battery".into(),
        }
    }

    #[tokio::test]
    async fn register_then_password_login() {
        let state = test_state();
        let out = register(&state, register_req("Ada@Example.com ")).await.unwrap();
        assert_eq!(out.user.email, "ada@example.com");
        assert!(state.sessions.verify(&out.tokens.access_token).await.is_ok());

        let tokens = login(
            &state,
            LoginRequest {
                email: "ada@example.com".into(),
                password: "correct horse battery".into(),
            },
        )
        .await
        .unwrap();
        let who = state.sessions.verify(&tokens.access_token).await.unwrap();
        assert_eq!(who.subject_id, out.user.id);
    }

    #[tokio::test]
    async fn wrong_password_unauthorized() {
        let state = test_state();
        register(&state, register_req("ada@example.com")).await.unwrap();
        let res = login(
            &state,
            LoginRequest {
                email: "ada@example.com".into(),
                password: "wrong password".into(),
            },
        )
        .await;
        assert!(matches!(res, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let state = test_state();
        register(&state, register_req("ada@example.com")).await.unwrap();
        assert!(matches!(
            register(&state, register_req("ada@example.com")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn me_populates_and_reads_cache() {
        let state = test_state();
        let out = register(&state, register_req("ada@example.com")).await.unwrap();

        let first = me(&state, &out.user.id).await.unwrap();
        assert_eq!(first, out.user);
        let cached = state.cache.get(&profile_key(&out.user.id)).await.unwrap();
        assert!(cached.is_some());

        assert_eq!(me(&state, &out.user.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn logout_evicts_profile() {
        let state = test_state();
        let out = register(&state, register_req("ada@example.com")).await.unwrap();
        me(&state, &out.user.id).await.unwrap();

        state.sessions.logout(&out.tokens.access_token).await.unwrap();
        assert_eq!(state.cache.get(&profile_key(&out.user.id)).await.unwrap(), None);
    }
}
