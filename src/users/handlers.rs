use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{MessageResponse, PublicUser, UpdateRoleRequest, UserResponse, UsersResponse},
        jwt::AuthUser,
    },
    error::AuthError,
    state::AppState,
};

/// Admin-only pass-throughs over the user store.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route(
            "/admin/users/:id",
            get(get_user).delete(delete_user).put(set_role),
        )
}

#[instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UsersResponse>, AuthError> {
    state.auth.require_admin(caller).await?;
    let users = state.auth.list_users().await?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.iter().map(PublicUser::from).collect(),
    }))
}

#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AuthError> {
    state.auth.require_admin(caller).await?;
    let user = state.auth.get_user(id).await?;
    Ok(Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
async fn set_role(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    state.auth.require_admin(caller).await?;
    let user = state.auth.set_role(id, payload.role).await?;
    Ok(Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.require_admin(caller).await?;
    let user = state.auth.delete_user(id).await?;

    // best effort, the row is already gone
    if let Some(avatar) = user.avatar() {
        if let Err(err) = state.avatars.delete(&avatar.id).await {
            warn!(user_id = %user.id, error = %err, "failed to delete avatar");
        }
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "User Deleted Successfully".into(),
    }))
}
