use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::{
        activation::ActivationService,
        jwt::TokenIssuer,
        repo::{CredentialStore, PgCredentialStore},
        session::SessionService,
    },
    config::AppConfig,
    mail::{Notifier, SmtpNotifier},
};

#[derive(Clone)]
pub struct AppState {
    pub activation: Arc<ActivationService>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connecting to postgres")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let store = Arc::new(PgCredentialStore::new(db)) as Arc<dyn CredentialStore>;
        let issuer = Arc::new(TokenIssuer::new(&config.jwt));
        let notifier = Arc::new(
            SmtpNotifier::new(&config.smtp, config.notify_timeout)
                .context("building smtp transport")?,
        ) as Arc<dyn Notifier>;

        let activation = Arc::new(ActivationService::new(
            store.clone(),
            issuer.clone(),
            notifier.clone(),
            config.app_url.clone(),
            config.notify_timeout,
        ));
        let sessions = Arc::new(SessionService::new(
            store,
            issuer,
            notifier,
            config.app_url.clone(),
            config.notify_timeout,
        ));

        Ok(Self::from_parts(activation, sessions))
    }

    pub fn from_parts(activation: Arc<ActivationService>, sessions: Arc<SessionService>) -> Self {
        Self {
            activation,
            sessions,
        }
    }
}
