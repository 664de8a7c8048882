use std::sync::Mutex;

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::error::AuthError;
use crate::users::{
    validate_new_user, validate_profile_patch, NewUser, ProfilePatch, Role, User, UserStore,
};

/// In-process store backing the test suite.
///
/// Rows live behind a single mutex, so `consume_reset_token` is naturally the
/// same one-shot conditional write the Postgres store performs.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn strip_password(mut user: User) -> User {
        user.password_hash = None;
        user
    }

    fn strip_password_ref(user: &User) -> User {
        Self::strip_password(user.clone())
    }

    fn project(user: &User, with_password: bool) -> User {
        if with_password {
            user.clone()
        } else {
            Self::strip_password(user.clone())
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(
        &self,
        email: &str,
        with_password: bool,
    ) -> Result<Option<User>, AuthError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.email == email)
            .map(|u| Self::project(u, with_password)))
    }

    async fn find_by_id(&self, id: Uuid, with_password: bool) -> Result<Option<User>, AuthError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.id == id)
            .map(|u| Self::project(u, with_password)))
    }

    async fn create(&self, new: NewUser) -> Result<User, AuthError> {
        validate_new_user(&new)?;
        let password_hash = hash_password(&new.password)?;

        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new.email) {
            return Err(AuthError::Validation("Email already registered".into()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: Some(password_hash),
            role: Role::User,
            avatar_id: new.avatar.as_ref().map(|a| a.id.clone()),
            avatar_url: new.avatar.as_ref().map(|a| a.url.clone()),
            reset_password_token_hash: None,
            reset_password_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(Self::strip_password(user))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_digest: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AuthError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        user.reset_password_token_hash = Some(token_digest.to_string());
        user.reset_password_expires_at = Some(expires_at);
        Ok(())
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<(), AuthError> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.reset_password_token_hash = None;
            user.reset_password_expires_at = None;
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_digest: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, AuthError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| {
                u.reset_password_token_hash.as_deref() == Some(token_digest)
                    && u.reset_password_expires_at.map(|e| e > now).unwrap_or(false)
            })
            .map(Self::strip_password_ref))
    }

    async fn consume_reset_token(
        &self,
        token_digest: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, AuthError> {
        let password_hash = hash_password(new_password)?;

        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| {
            u.reset_password_token_hash.as_deref() == Some(token_digest)
                && u.reset_password_expires_at.map(|e| e > now).unwrap_or(false)
        });
        match user {
            Some(user) => {
                user.password_hash = Some(password_hash);
                user.reset_password_token_hash = None;
                user.reset_password_expires_at = None;
                Ok(Some(Self::strip_password(user.clone())))
            }
            None => Ok(None),
        }
    }

    async fn update_password(&self, id: Uuid, new_password: &str) -> Result<(), AuthError> {
        let password_hash = hash_password(new_password)?;
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        user.password_hash = Some(password_hash);
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<User, AuthError> {
        validate_profile_patch(&patch)?;
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &patch.email {
            if users.iter().any(|u| u.email == *email && u.id != id) {
                return Err(AuthError::Validation("Email already registered".into()));
            }
        }
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        Ok(Self::strip_password(user.clone()))
    }

    async fn list(&self) -> Result<Vec<User>, AuthError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().map(Self::strip_password_ref).collect())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AuthError> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.role = role;
                Ok(Some(Self::strip_password(user.clone())))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let mut users = self.users.lock().unwrap();
        match users.iter().position(|u| u.id == id) {
            Some(index) => Ok(Some(Self::strip_password(users.remove(index)))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn alice() -> NewUser {
        NewUser {
            name: "Alice Wonder".into(),
            email: "alice@example.com".into(),
            password: "Secret123".into(),
            avatar: None,
        }
    }

    #[tokio::test]
    async fn create_hashes_password_and_defaults_role() {
        let store = MemoryUserStore::new();
        let user = store.create(alice()).await.unwrap();
        assert_eq!(user.role, Role::User);

        let stored = store
            .find_by_email("alice@example.com", true)
            .await
            .unwrap()
            .unwrap();
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, "Secret123");
        assert!(!hash.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_fails_and_leaves_prior_state() {
        let store = MemoryUserStore::new();
        let first = store.create(alice()).await.unwrap();

        let mut dup = alice();
        dup.name = "Other Alice".into();
        let err = store.create(dup).await.unwrap_err();
        assert!(err.to_string().contains("already registered"));

        let kept = store
            .find_by_email("alice@example.com", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.id, first.id);
        assert_eq!(kept.name, "Alice Wonder");
    }

    #[tokio::test]
    async fn password_projection_is_opt_in() {
        let store = MemoryUserStore::new();
        let user = store.create(alice()).await.unwrap();
        assert!(user.password_hash.is_none());

        let without = store.find_by_id(user.id, false).await.unwrap().unwrap();
        assert!(without.password_hash.is_none());

        let with = store.find_by_id(user.id, true).await.unwrap().unwrap();
        assert!(with.password_hash.is_some());
    }

    #[tokio::test]
    async fn reset_token_fields_move_together() {
        let store = MemoryUserStore::new();
        let user = store.create(alice()).await.unwrap();
        let expires = OffsetDateTime::now_utc() + Duration::minutes(15);

        store.set_reset_token(user.id, "digest", expires).await.unwrap();
        let issued = store.find_by_id(user.id, false).await.unwrap().unwrap();
        assert!(issued.reset_password_token_hash.is_some());
        assert!(issued.reset_password_expires_at.is_some());

        store.clear_reset_token(user.id).await.unwrap();
        let cleared = store.find_by_id(user.id, false).await.unwrap().unwrap();
        assert!(cleared.reset_password_token_hash.is_none());
        assert!(cleared.reset_password_expires_at.is_none());
    }

    #[tokio::test]
    async fn consume_is_conditional_on_digest_and_expiry() {
        let store = MemoryUserStore::new();
        let user = store.create(alice()).await.unwrap();
        let now = OffsetDateTime::now_utc();

        store
            .set_reset_token(user.id, "digest", now + Duration::minutes(15))
            .await
            .unwrap();

        // wrong digest
        let miss = store
            .consume_reset_token("other", "NewSecret1", now)
            .await
            .unwrap();
        assert!(miss.is_none());

        // expired
        let late = store
            .consume_reset_token("digest", "NewSecret1", now + Duration::minutes(16))
            .await
            .unwrap();
        assert!(late.is_none());

        // valid: password replaced, token cleared
        let won = store
            .consume_reset_token("digest", "NewSecret1", now + Duration::minutes(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(won.id, user.id);
        assert!(won.reset_password_token_hash.is_none());
        assert!(won.reset_password_expires_at.is_none());

        // second consume of the same token loses
        let again = store
            .consume_reset_token("digest", "Another12", now + Duration::minutes(1))
            .await
            .unwrap();
        assert!(again.is_none());
    }
}
