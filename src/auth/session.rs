use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        dto::{PublicUser, SessionGrant},
        jwt::TokenIssuer,
        password::{hash_password, verify_dummy, verify_password},
        repo::{CredentialStore, StoreError},
    },
    error::AuthError,
    mail::{send_with_timeout, Notifier, Template, TemplateVars},
};

/// Identity established by a valid session token, threaded explicitly into handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: PublicUser,
    pub token_version: i32,
}

impl AuthContext {
    /// Role guard for handlers restricted to some roles, applied to the
    /// context yielded by the `AuthUser` extractor.
    ///
    /// Passes when `roles` is empty or the user holds any of them.
    pub fn require_role(&self, roles: &[&str]) -> Result<(), AuthError> {
        if roles.is_empty() || self.user.roles.iter().any(|r| roles.contains(&r.as_str())) {
            Ok(())
        } else {
            warn!(user_id = self.user.id, ?roles, "missing required role");
            Err(AuthError::Forbidden)
        }
    }
}

/// Login, session validation and password lifecycle.
pub struct SessionService {
    store: Arc<dyn CredentialStore>,
    issuer: Arc<TokenIssuer>,
    notifier: Arc<dyn Notifier>,
    app_url: String,
    notify_timeout: Duration,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        issuer: Arc<TokenIssuer>,
        notifier: Arc<dyn Notifier>,
        app_url: String,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            store,
            issuer,
            notifier,
            app_url,
            notify_timeout,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
        let user = match self.store.find_by_email(email).await? {
            Some(u) => u,
            None => {
                verify_dummy(password);
                warn!(%email, "failed login attempt");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(%email, user_id = user.id, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.active {
            warn!(%email, user_id = user.id, "login attempt to inactive account");
            return Err(AuthError::NotActivated);
        }

        let token = self.issuer.issue_session(user.id, user.token_version)?;
        info!(user_id = user.id, "user logged in");
        Ok(SessionGrant {
            token,
            token_version: user.token_version,
            user: PublicUser::from(&user),
        })
    }

    /// Validates a bearer token against the user's current state.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.issuer.verify_session(token)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if claims.token_version != user.token_version {
            debug!(user_id = user.id, "stale token version");
            return Err(AuthError::InvalidToken);
        }
        if !user.active {
            return Err(AuthError::NotActivated);
        }

        Ok(AuthContext {
            token_version: user.token_version,
            user: PublicUser::from(&user),
        })
    }

    /// Replaces the password of an authenticated user, invalidating older sessions.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        info!(user_id, "change password requested");
        let user = match self.store.find_by_id(user_id).await? {
            Some(u) => u,
            None => {
                warn!(user_id, "user not found for change password");
                return Err(AuthError::NotFound("user"));
            }
        };

        if !verify_password(current_password, &user.password_hash)? {
            warn!(user_id, "invalid current password");
            return Err(AuthError::InvalidCredentials);
        }

        let hash = hash_password(new_password)?;
        let version = self.store.update_credentials(user_id, &hash).await?;
        info!(user_id, token_version = version, "password changed");
        Ok(())
    }

    /// Mails a reset link when the account exists. Always succeeds for the caller.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            warn!(%email, "forgot password for unknown email");
            return Ok(());
        };

        let token = self.issuer.issue_reset_token(user.id)?;
        let mut vars = TemplateVars::new();
        vars.insert("user_name", user.name.clone());
        vars.insert(
            "link",
            format!("{}/reset-password?token={}", self.app_url, token),
        );

        match send_with_timeout(
            self.notifier.as_ref(),
            self.notify_timeout,
            &user.email,
            "Reset password",
            Template::ResetPassword,
            &vars,
        )
        .await
        {
            Ok(()) => info!(user_id = user.id, "reset password email sent"),
            Err(e) => error!(error = %e, user_id = user.id, "reset password email failed"),
        }
        Ok(())
    }

    /// Checks signature, expiry and type of a reset token without saying which failed.
    pub fn verify_reset_token(&self, raw: &str) -> Result<i64, AuthError> {
        self.issuer
            .verify_reset_token(raw)
            .map(|claims| claims.sub)
            .map_err(|e| {
                debug!(error = %e, "reset token rejected");
                AuthError::InvalidOrExpiredToken
            })
    }

    pub async fn apply_password_reset(
        &self,
        user_id: i64,
        new_password: &str,
    ) -> Result<(), AuthError> {
        info!(user_id, "reset password requested");
        let hash = hash_password(new_password)?;
        match self.store.update_credentials(user_id, &hash).await {
            Ok(version) => {
                info!(user_id, token_version = version, "password reset");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                warn!(user_id, "reset password for missing user");
                Err(AuthError::NotFound("user"))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> Result<(), AuthError> {
        let user_id = self.verify_reset_token(raw_token)?;
        self.apply_password_reset(user_id, new_password).await
    }
}
