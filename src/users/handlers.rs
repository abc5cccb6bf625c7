use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateUser, UpdatePhoto, UpdateUser, UserFilter},
    repo_types::UserView,
};
use crate::{
    auth::{
        extractors::AuthUser,
        roles::{Admins, RequireRole, Superadmins},
    },
    error::AppResult,
    extract::{Json, Path, Query},
    response::ApiResponse,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list).post(create))
        .route("/user/photo", patch(update_photo))
        .route("/user/:id", get(get_one).patch(update).delete(remove))
}

#[instrument(skip(state, caller, payload), fields(caller = %caller.id))]
pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<CreateUser>,
) -> AppResult<ApiResponse<()>> {
    state.users.create(payload).await?;
    Ok(ApiResponse::empty(
        StatusCode::CREATED,
        "User created successfully",
    ))
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireRole(caller, ..): RequireRole<Admins>,
    Query(filter): Query<UserFilter>,
) -> AppResult<ApiResponse<Vec<UserView>>> {
    let page = state.users.find_all(&filter).await?;
    Ok(ApiResponse::ok(page.entities, "Users retrieved successfully").with_meta(page.meta))
}

#[instrument(skip(state, _caller))]
pub async fn get_one(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<UserView>> {
    let user = state.users.find_one(id).await?;
    Ok(ApiResponse::ok(user, "User found successfully"))
}

#[instrument(skip(state, caller, payload), fields(caller = %caller.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireRole(caller, ..): RequireRole<Admins>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> AppResult<ApiResponse<UserView>> {
    let user = state.users.update(id, payload).await?;
    Ok(ApiResponse::ok(user, "User updated successfully"))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn update_photo(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<UpdatePhoto>,
) -> AppResult<ApiResponse<UserView>> {
    let user = state.users.update_photo(caller.id, payload.photo).await?;
    Ok(ApiResponse::ok(user, "User photo updated successfully"))
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireRole(caller, ..): RequireRole<Superadmins>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    state.users.remove(id).await?;
    Ok(ApiResponse::empty(StatusCode::OK, "User deleted successfully"))
}
