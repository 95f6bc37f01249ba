use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        error::AuthError,
        extractors::CurrentUser,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/users", post(create_user).get(list_users))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/check-token", get(check_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    let Json(payload) = payload?;
    let user = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LoginResponse>), AuthError> {
    let Json(payload) = payload?;
    let res = state.auth.sign_up(payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Json(payload) = payload?;
    Ok(Json(state.auth.login(payload).await?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn check_token(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<LoginResponse>, AuthError> {
    Ok(Json(state.auth.refresh_session(&user)?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    Ok(Json(state.auth.list_users().await?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user)
}
