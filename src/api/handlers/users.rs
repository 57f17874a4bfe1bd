use crate::{
    auth::middleware::AuthUser,
    types::{Result, UserId, UserProfile},
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};

/// Profile of the authenticated caller
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "User no longer exists")
    ),
    tag = "users"
)]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<UserProfile>> {
    let profile = state.sessions.current_user(ctx.user_id).await?;
    Ok(Json(profile))
}

/// Look up any user by id (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserProfile),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserProfile>> {
    let profile = state.sessions.user_by_id(id).await?;
    Ok(Json(profile))
}
