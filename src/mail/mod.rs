use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;

mod smtp;
mod templates;

pub use smtp::SmtpNotifier;
pub use templates::Template;

/// Values substituted into a template, keyed by placeholder name.
pub type TemplateVars = BTreeMap<&'static str, String>;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("notification timed out")]
    Timeout,
}

/// Outbound channel for activation and password-reset emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        template: Template,
        vars: &TemplateVars,
    ) -> Result<(), NotifyError>;
}

/// Sends through `notifier`, failing with [`NotifyError::Timeout`] once `limit` elapses.
pub async fn send_with_timeout(
    notifier: &dyn Notifier,
    limit: Duration,
    to: &str,
    subject: &str,
    template: Template,
    vars: &TemplateVars,
) -> Result<(), NotifyError> {
    tokio::time::timeout(limit, notifier.send(to, subject, template, vars))
        .await
        .map_err(|_| NotifyError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Notifier for Slow {
        async fn send(&self, _: &str, _: &str, _: Template, _: &TemplateVars) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    struct Immediate;

    #[async_trait]
    impl Notifier for Immediate {
        async fn send(&self, _: &str, _: &str, _: Template, _: &TemplateVars) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_notifier_times_out() {
        let res = send_with_timeout(
            &Slow,
            Duration::from_millis(20),
            "a@b.co",
            "subject",
            Template::Welcome,
            &TemplateVars::new(),
        )
        .await;
        assert!(matches!(res, Err(NotifyError::Timeout)));
    }

    #[tokio::test]
    async fn fast_notifier_passes_through() {
        let res = send_with_timeout(
            &Immediate,
            Duration::from_secs(1),
            "a@b.co",
            "subject",
            Template::Welcome,
            &TemplateVars::new(),
        )
        .await;
        assert!(res.is_ok());
    }
}
