use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{
    auth::{
        extractor::{AuthUser, BearerToken},
        tokens::IssuedTokens,
    },
    dto::auth::{LoginRequest, LogoutAllResponse, RefreshRequest, RegisterRequest, RegisterResponse},
    errors::AppError,
    models::user::UserPublic,
    services::auth_service,
    state::AppState,
};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let out = auth_service::register(&state, req).await?;
    Ok(Json(RegisterResponse {
        user: out.user,
        tokens: out.tokens,
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<IssuedTokens>, AppError> {
    Ok(Json(auth_service::login(&state, req).await?))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<IssuedTokens>, AppError> {
    Ok(Json(state.sessions.refresh(&req.refresh_token).await?))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<serde_json::Value>, AppError> {
    state.sessions.logout(&token).await?;
    Ok(Json(serde_json::json!({"status":"ok"})))
}

pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<LogoutAllResponse>, AppError> {
    state.sessions.logout_all(&user.subject_id).await?;
    Ok(Json(LogoutAllResponse { status: "ok" }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserPublic>, AppError> {
    Ok(Json(auth_service::me(&state, &user.subject_id).await?))
}
