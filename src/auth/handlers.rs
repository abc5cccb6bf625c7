use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{LoginRequest, LoginResponse, MeView, RegisterRequest},
    extractors::AuthUser,
};
use crate::{
    error::AppResult, extract::Json, response::ApiResponse, state::AppState,
    users::repo_types::UserView,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<ApiResponse<UserView>> {
    let user = state.auth.register(payload).await?;
    Ok(ApiResponse::ok(user, "User registered successfully"))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<ApiResponse<LoginResponse>> {
    let res = state.auth.login(payload).await?;
    Ok(ApiResponse::ok(res, "User logged in successfully"))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResponse<MeView> {
    ApiResponse::ok(state.auth.me(&user), "Current user fetched successfully")
}
