use std::{sync::Arc, time::Duration};

use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{PublicUser, RegisterRequest, SessionGrant},
        jwt::{generate_activation_token, TokenIssuer, ACTIVATION_TOKEN_TTL},
        password::hash_password,
        repo::{CredentialStore, StoreError},
        repo_types::{NewUser, User, ROLE_USER},
    },
    error::AuthError,
    mail::{send_with_timeout, Notifier, Template, TemplateVars},
};

/// Registration and email-gated activation.
pub struct ActivationService {
    store: Arc<dyn CredentialStore>,
    issuer: Arc<TokenIssuer>,
    notifier: Arc<dyn Notifier>,
    app_url: String,
    notify_timeout: Duration,
}

impl ActivationService {
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

    fn activation_vars(&self, user: &User, token: &str) -> TemplateVars {
        let mut vars = TemplateVars::new();
        vars.insert("user_name", user.name.clone());
        vars.insert("link", format!("{}/activate?token={}", self.app_url, token));
        vars
    }

    fn token_expiry() -> OffsetDateTime {
        OffsetDateTime::now_utc() + TimeDuration::seconds(ACTIVATION_TOKEN_TTL.as_secs() as i64)
    }

    /// Creates an inactive user with an activation token and mails the link.
    /// A failed or timed-out email rolls back both rows.
    pub async fn register(&self, req: RegisterRequest) -> Result<PublicUser, AuthError> {
        if self
            .store
            .exists_by_email_or_username(&req.email, req.username.as_deref())
            .await?
        {
            warn!(email = %req.email, "email or username already in use");
            return Err(AuthError::Conflict);
        }

        let password_hash = hash_password(&req.password)?;
        let token = generate_activation_token();
        let expires_at = Self::token_expiry();

        let new_user = NewUser {
            name: req.name,
            lastname: req.lastname,
            email: req.email,
            username: req.username,
            password_hash,
            roles: vec![ROLE_USER.to_string()],
            location: req.location,
        };

        let mut tx = self.store.begin_registration().await?;
        let user = tx.insert_user(&new_user).await?;
        info!(user_id = user.id, email = %user.email, "user created");
        tx.insert_activation_token(user.id, &token, expires_at).await?;

        let subject = format!("Activate your account at {}", self.app_url);
        let vars = self.activation_vars(&user, &token);
        if let Err(e) = send_with_timeout(
            self.notifier.as_ref(),
            self.notify_timeout,
            &user.email,
            &subject,
            Template::Welcome,
            &vars,
        )
        .await
        {
            error!(error = %e, user_id = user.id, "activation email failed, rolling back");
            if let Err(rollback) = tx.rollback().await {
                error!(error = %rollback, "rollback failed");
            }
            return Err(AuthError::DeliveryFailure(e));
        }

        tx.commit().await?;
        info!(user_id = user.id, "activation email sent");
        Ok(PublicUser::from(&user))
    }

    /// Resolves a raw activation token to its user, rejecting unknown or expired ones.
    pub async fn resolve_activation_token(&self, raw: &str) -> Result<i64, AuthError> {
        let activation = self
            .store
            .find_activation_token(raw)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if activation.is_expired_at(OffsetDateTime::now_utc()) {
            warn!(user_id = activation.user_id, "activation token expired");
            return Err(AuthError::Expired);
        }
        Ok(activation.user_id)
    }

    /// Activates an already resolved user and logs them in.
    pub async fn activate(&self, user_id: i64) -> Result<SessionGrant, AuthError> {
        let user = match self.store.activate_user(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                warn!(user_id, "attempt to activate missing user");
                return Err(AuthError::NotFound("user"));
            }
            Err(e) => return Err(e.into()),
        };
        info!(user_id, "user activated");

        let token = self.issuer.issue_session(user.id, user.token_version)?;
        Ok(SessionGrant {
            token,
            token_version: user.token_version,
            user: PublicUser::from(&user),
        })
    }

    pub async fn activate_by_token(&self, raw: &str) -> Result<SessionGrant, AuthError> {
        let user_id = self.resolve_activation_token(raw).await?;
        self.activate(user_id).await
    }

    /// Issues a fresh activation link, at most one live link per user.
    pub async fn resend_activation(&self, email: &str) -> Result<(), AuthError> {
        let user = match self.store.find_by_email(email).await? {
            Some(u) => u,
            None => {
                warn!(%email, "resend activation for unknown email");
                return Err(AuthError::NotFound("user"));
            }
        };
        if user.active {
            warn!(user_id = user.id, "resend activation for active user");
            return Err(AuthError::AlreadyActive);
        }

        if let Some(existing) = self.store.find_activation_token_for_user(user.id).await? {
            if !existing.is_expired_at(OffsetDateTime::now_utc()) {
                info!(user_id = user.id, "resend avoided, live activation token exists");
                return Err(AuthError::AlreadySent);
            }
        }

        let token = generate_activation_token();
        self.store
            .replace_activation_token(user.id, &token, Self::token_expiry())
            .await?;

        let vars = self.activation_vars(&user, &token);
        send_with_timeout(
            self.notifier.as_ref(),
            self.notify_timeout,
            &user.email,
            "Activation link resent",
            Template::ResendActivation,
            &vars,
        )
        .await
        .map_err(AuthError::DeliveryFailure)?;

        info!(user_id = user.id, "activation email resent");
        Ok(())
    }
}
