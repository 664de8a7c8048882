use axum::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;

pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// Opaque reference to an externally hosted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRef {
    pub id: String,
    pub url: String,
}

/// User record in the database.
///
/// `password_hash` is `None` whenever the row was read without the
/// password projection; it is never serialized either way.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub avatar_id: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn avatar(&self) -> Option<AvatarRef> {
        match (&self.avatar_id, &self.avatar_url) {
            (Some(id), Some(url)) => Some(AvatarRef {
                id: id.clone(),
                url: url.clone(),
            }),
            _ => None,
        }
    }
}

/// Input for `UserStore::create`; the password arrives in plaintext and is
/// hashed exactly once inside the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<AvatarRef>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_name(name: &str) -> Result<(), AuthError> {
    if name.chars().count() < 4 {
        return Err(AuthError::Validation(
            "Name should be atleast 4 characters".into(),
        ));
    }
    if name.chars().count() > 30 {
        return Err(AuthError::Validation(
            "Name cannot exceed 30 characters".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::Validation("Please Enter a valid email".into()));
    }
    Ok(())
}

pub(crate) fn validate_new_user(new: &NewUser) -> Result<(), AuthError> {
    validate_name(&new.name)?;
    validate_email(&new.email)?;
    if new.password.len() < 8 {
        return Err(AuthError::Validation(
            "Password should be greater than 8 characters".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_profile_patch(patch: &ProfilePatch) -> Result<(), AuthError> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(email) = &patch.email {
        validate_email(email)?;
    }
    Ok(())
}

/// Persistence contract for the `User` entity. The store is the sole writer
/// of credential fields: password hashing happens inside `create`,
/// `consume_reset_token` and `update_password`, and nowhere else, so a write
/// that leaves the password untouched never rehashes it.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(
        &self,
        email: &str,
        with_password: bool,
    ) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid, with_password: bool) -> Result<Option<User>, AuthError>;

    async fn create(&self, new: NewUser) -> Result<User, AuthError>;

    /// Sets the reset-token digest and its expiry together. Skips entity
    /// validation so a user with otherwise-invalid legacy data can still
    /// reset their password.
    async fn set_reset_token(
        &self,
        id: Uuid,
        token_digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AuthError>;

    /// Clears both token fields together.
    async fn clear_reset_token(&self, id: Uuid) -> Result<(), AuthError>;

    async fn find_by_reset_token(
        &self,
        token_digest: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, AuthError>;

    /// Single conditional write keyed on the still-valid digest: replaces the
    /// password hash and clears both token fields, or returns `None` if the
    /// digest no longer matches or has expired. Under concurrent calls with
    /// the same token exactly one caller gets the user back.
    async fn consume_reset_token(
        &self,
        token_digest: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, AuthError>;

    async fn update_password(&self, id: Uuid, new_password: &str) -> Result<(), AuthError>;

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<User, AuthError>;

    async fn list(&self) -> Result<Vec<User>, AuthError>;

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AuthError>;

    async fn delete(&self, id: Uuid) -> Result<Option<User>, AuthError>;
}
