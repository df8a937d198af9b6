use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, error};

use super::{Notifier, NotifyError, Template, TemplateVars};
use crate::config::SmtpConfig;

/// Delivers templated HTML emails over SMTP.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&config.from)?;

        // Implicit TLS (usually 465) when secure, STARTTLS (usually 587) otherwise.
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport, from })
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, NotifyError> {
    raw.parse::<Mailbox>()
        .map_err(|e| NotifyError::Address(format!("{raw}: {e}")))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        template: Template,
        vars: &TemplateVars,
    ) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(template.render(vars))?;

        match self.transport.send(message).await {
            Ok(_) => {
                debug!(to, ?template, "email sent");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, to, ?template, "error sending email");
                Err(e.into())
            }
        }
    }
}
