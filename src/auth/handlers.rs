use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::Engine;
use bytes::Bytes;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest, UpdateProfileRequest,
            UserResponse,
        },
        jwt::{expired_session_cookie, session_cookie, AuthUser},
    },
    error::AuthError,
    state::AppState,
    users::{AvatarRef, NewUser, ProfilePatch, User},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset/:token", put(reset_password))
        .route("/password/update", put(update_password))
        .route("/me", get(me))
        .route("/me/update", put(update_profile))
}

/// Serializes the auth body and attaches the session cookie; the cookie
/// lifetime matches the token's.
fn session_response(
    state: &AppState,
    status: StatusCode,
    body: AuthResponse,
) -> Result<Response, AuthError> {
    let cookie = session_cookie(&body.token, state.auth.session_ttl());
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("invalid cookie header: {e}")))?;
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(SET_COOKIE, value);
    Ok(response)
}

fn auth_body(user: &User, token: String) -> AuthResponse {
    AuthResponse {
        success: true,
        token,
        user: PublicUser::from(user),
    }
}

async fn upload_avatar(
    state: &AppState,
    payload: Option<crate::auth::dto::AvatarUpload>,
) -> Result<Option<AvatarRef>, AuthError> {
    let Some(upload) = payload else {
        return Ok(None);
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(upload.data.as_bytes())
        .map_err(|_| AuthError::Validation("Avatar is not valid base64".into()))?;
    let content_type = upload.content_type.as_deref().unwrap_or("image/png");
    let avatar = state
        .avatars
        .upload(Bytes::from(bytes), content_type)
        .await?;
    Ok(Some(avatar))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Response, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    let avatar = upload_avatar(&state, payload.avatar.take()).await?;
    let (user, token) = state
        .auth
        .register(NewUser {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            avatar,
        })
        .await?;

    session_response(&state, StatusCode::CREATED, auth_body(&user, token))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    payload.email = payload.email.trim().to_lowercase();
    let (user, token) = state.auth.login(&payload.email, &payload.password).await?;
    session_response(&state, StatusCode::OK, auth_body(&user, token))
}

/// Logout replaces the cookie with an already-expired one; the token itself
/// stays valid until natural expiry.
#[instrument]
async fn logout() -> Result<Response, AuthError> {
    let value = HeaderValue::from_str(&expired_session_cookie())
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("invalid cookie header: {e}")))?;
    let mut response = Json(MessageResponse {
        success: true,
        message: "Logged Out Successfully".into(),
    })
    .into_response();
    response.headers_mut().insert(SET_COOKIE, value);
    Ok(response)
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let message = state
        .auth
        .forgot_password(&payload.email.trim().to_lowercase())
        .await?;
    Ok(Json(MessageResponse {
        success: true,
        message,
    }))
}

#[instrument(skip(state, payload, token))]
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response, AuthError> {
    let (user, session) = state
        .auth
        .reset_password(&token, &payload.password, &payload.confirm_password)
        .await?;
    session_response(&state, StatusCode::OK, auth_body(&user, session))
}

#[instrument(skip(state, payload))]
async fn update_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Response, AuthError> {
    let (user, token) = state
        .auth
        .update_password(
            user_id,
            &payload.old_password,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;
    session_response(&state, StatusCode::OK, auth_body(&user, token))
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth.current_user(user_id).await?;
    Ok(Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state
        .auth
        .update_profile(
            user_id,
            ProfilePatch {
                name: payload.name,
                email: payload.email.map(|e| e.trim().to_lowercase()),
            },
        )
        .await?;
    Ok(Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    }))
}
