use std::sync::Arc;

use time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::jwt::SessionKeys;
use crate::auth::password::verify_password;
use crate::auth::reset;
use crate::clock::Clock;
use crate::config::ResetConfig;
use crate::error::AuthError;
use crate::mailer::Mailer;
use crate::users::{NewUser, ProfilePatch, Role, User, UserStore};

/// Orchestrates credential and session lifecycle: registration, login,
/// the forgot/reset-token protocol and password/profile updates. Owns no
/// user state itself; the store is the single source of truth.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    keys: SessionKeys,
    clock: Arc<dyn Clock>,
    reset: ResetConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        keys: SessionKeys,
        clock: Arc<dyn Clock>,
        reset: ResetConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            keys,
            clock,
            reset,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.keys.ttl()
    }

    fn issue_session(&self, user_id: Uuid) -> Result<String, AuthError> {
        let token = self.keys.sign(user_id, self.clock.now())?;
        Ok(token)
    }

    /// Validates a presented session token and returns the user it names.
    pub fn verify_session(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self
            .keys
            .verify(token, self.clock.now())
            .map_err(|_| AuthError::Authentication("Invalid or expired token".into()))?;
        Ok(claims.sub)
    }

    pub async fn register(&self, new: NewUser) -> Result<(User, String), AuthError> {
        let user = self.store.create(new).await?;
        let token = self.issue_session(user.id)?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok((user, token))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Please Enter Email and Password".into(),
            ));
        }

        // Absent account and wrong password collapse into one message so the
        // response never reveals whether the email is registered.
        let user = self
            .store
            .find_by_email(email, true)
            .await?
            .ok_or_else(|| AuthError::Authentication("Invalid email or password".into()))?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or_else(|| AuthError::Internal(anyhow::anyhow!("password hash not loaded")))?;

        if !verify_password(password, hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::Authentication("Invalid email or password".into()));
        }

        let token = self.issue_session(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, token))
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id, false)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))
    }

    /// Issues a reset token: stores its digest with a short expiry and mails
    /// the raw value. A mailer failure clears the token again before the
    /// error surfaces, so a failed email never leaves a dangling token.
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let user = self
            .store
            .find_by_email(email, false)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

        let (raw_token, token_digest) = reset::generate();
        let expires_at = self.clock.now() + Duration::minutes(self.reset.ttl_minutes);
        self.store
            .set_reset_token(user.id, &token_digest, expires_at)
            .await?;

        let reset_url = format!("{}/password/reset/{}", self.reset.base_url, raw_token);
        let body = format!(
            "Your Password reset token is: \n\n {reset_url} \n\n \
             If you have not requested this email then, please ignore this email"
        );

        if let Err(send_err) = self
            .mailer
            .send(&user.email, "Kindiyo Password Recovery", &body)
            .await
        {
            warn!(user_id = %user.id, error = %send_err, "reset email failed, clearing token");
            if let Err(clear_err) = self.store.clear_reset_token(user.id).await {
                error!(user_id = %user.id, error = %clear_err, "failed to clear reset token");
            }
            return Err(AuthError::Internal(send_err));
        }

        info!(user_id = %user.id, "reset email sent");
        Ok(format!("Email sent to {} successfully", user.email))
    }

    /// Consumes a reset token. Absent and expired digests collapse into the
    /// same error; under concurrent calls with the same token the store-level
    /// conditional write lets exactly one caller through.
    pub async fn reset_password(
        &self,
        raw_token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(User, String), AuthError> {
        let token_digest = reset::digest_of(raw_token);
        let now = self.clock.now();

        self.store
            .find_by_reset_token(&token_digest, now)
            .await?
            .ok_or(AuthError::ExpiredOrInvalidToken)?;

        if password != confirm_password {
            return Err(AuthError::Validation("Passwords not matched".into()));
        }

        let user = self
            .store
            .consume_reset_token(&token_digest, password, now)
            .await?
            .ok_or(AuthError::ExpiredOrInvalidToken)?;

        let token = self.issue_session(user.id)?;
        info!(user_id = %user.id, "password reset");
        Ok((user, token))
    }

    pub async fn update_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(User, String), AuthError> {
        let user = self
            .store
            .find_by_id(user_id, true)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or_else(|| AuthError::Internal(anyhow::anyhow!("password hash not loaded")))?;

        if !verify_password(old_password, hash)? {
            return Err(AuthError::Authentication("Old password is incorrect".into()));
        }
        if new_password != confirm_password {
            return Err(AuthError::Validation("Password does not match".into()));
        }

        self.store.update_password(user_id, new_password).await?;
        // Previously issued sessions stay valid until expiry; only a fresh
        // token is handed back.
        let token = self.issue_session(user_id)?;
        info!(user_id = %user_id, "password updated");
        Ok((user, token))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> Result<User, AuthError> {
        self.store.update_profile(user_id, patch).await
    }

    pub async fn require_admin(&self, user_id: Uuid) -> Result<User, AuthError> {
        let user = self.current_user(user_id).await?;
        if user.role != Role::Admin {
            return Err(AuthError::Forbidden(format!(
                "Role: {:?} is not allowed to access this resource",
                user.role
            )));
        }
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        self.store.list().await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(id, false)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("User does not exist with id: {id}")))
    }

    pub async fn set_role(&self, id: Uuid, role: Role) -> Result<User, AuthError> {
        self.store
            .set_role(id, role)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("User does not exist with id: {id}")))
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<User, AuthError> {
        self.store
            .delete(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("User does not exist with id: {id}")))
    }
}
