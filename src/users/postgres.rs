use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::error::AuthError;
use crate::users::{
    validate_new_user, validate_profile_patch, NewUser, ProfilePatch, Role, User, UserStore,
};

const COLUMNS: &str = "id, name, email, password_hash, role, avatar_id, avatar_url, \
                       reset_password_token_hash, reset_password_expires_at, created_at";

// Same projection with the hash masked out; verification paths are the only
// ones allowed to read it.
const COLUMNS_NO_PASSWORD: &str =
    "id, name, email, NULL::text AS password_hash, role, avatar_id, avatar_url, \
     reset_password_token_hash, reset_password_expires_at, created_at";

fn columns(with_password: bool) -> &'static str {
    if with_password {
        COLUMNS
    } else {
        COLUMNS_NO_PASSWORD
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(
        &self,
        email: &str,
        with_password: bool,
    ) -> Result<Option<User>, AuthError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", columns(with_password));
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid, with_password: bool) -> Result<Option<User>, AuthError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", columns(with_password));
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> Result<User, AuthError> {
        validate_new_user(&new)?;
        let password_hash = hash_password(&new.password)?;
        let (avatar_id, avatar_url) = match new.avatar {
            Some(avatar) => (Some(avatar.id), Some(avatar.url)),
            None => (None, None),
        };

        let query = format!(
            "INSERT INTO users (name, email, password_hash, avatar_id, avatar_url) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS_NO_PASSWORD}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&password_hash)
            .bind(avatar_id)
            .bind(avatar_url)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE users \
             SET reset_password_token_hash = $2, reset_password_expires_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token_digest)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users \
             SET reset_password_token_hash = NULL, reset_password_expires_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_digest: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, AuthError> {
        let query = format!(
            "SELECT {COLUMNS_NO_PASSWORD} FROM users \
             WHERE reset_password_token_hash = $1 AND reset_password_expires_at > $2"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token_digest)
            .bind(now)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn consume_reset_token(
        &self,
        token_digest: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, AuthError> {
        let password_hash = hash_password(new_password)?;
        // One conditional write: only the caller whose digest is still
        // current gets a row back.
        let query = format!(
            "UPDATE users \
             SET password_hash = $2, reset_password_token_hash = NULL, \
                 reset_password_expires_at = NULL \
             WHERE reset_password_token_hash = $1 AND reset_password_expires_at > $3 \
             RETURNING {COLUMNS_NO_PASSWORD}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token_digest)
            .bind(&password_hash)
            .bind(now)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, new_password: &str) -> Result<(), AuthError> {
        let password_hash = hash_password(new_password)?;
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(&password_hash)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<User, AuthError> {
        validate_profile_patch(&patch)?;
        let query = format!(
            "UPDATE users \
             SET name = COALESCE($2, name), email = COALESCE($3, email) \
             WHERE id = $1 \
             RETURNING {COLUMNS_NO_PASSWORD}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(patch.name)
            .bind(patch.email)
            .fetch_optional(&self.db)
            .await?;
        user.ok_or_else(|| AuthError::NotFound("User not found".into()))
    }

    async fn list(&self) -> Result<Vec<User>, AuthError> {
        let query = format!("SELECT {COLUMNS_NO_PASSWORD} FROM users ORDER BY created_at");
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AuthError> {
        let query = format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {COLUMNS_NO_PASSWORD}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let query = format!("DELETE FROM users WHERE id = $1 RETURNING {COLUMNS_NO_PASSWORD}");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}
