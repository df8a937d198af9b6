use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Base URL of the frontend, used to build activation and reset links.
    pub app_url: String,
    pub notify_timeout: Duration,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let app_url = std::env::var("APP_URL")
            .or_else(|_| std::env::var("CORS_ORIGIN"))
            .unwrap_or_else(|_| "http://localhost:3000".into());
        let notify_timeout = Duration::from_secs(
            std::env::var("NOTIFY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
        );

        let expires_in = std::env::var("JWT_EXPIRES_IN").unwrap_or_else(|_| "60m".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "authgate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authgate-users".into()),
            expires_in: parse_duration(&expires_in)
                .with_context(|| format!("invalid JWT_EXPIRES_IN: {expires_in}"))?,
        };

        let smtp = SmtpConfig {
            host: std::env::var("EMAIL_SMTP_HOST").context("EMAIL_SMTP_HOST is not set")?,
            port: std::env::var("EMAIL_SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("EMAIL_SMTP_USERNAME")
                .context("EMAIL_SMTP_USERNAME is not set")?,
            password: std::env::var("EMAIL_SMTP_PASSWORD")
                .context("EMAIL_SMTP_PASSWORD is not set")?,
            from: std::env::var("EMAIL_SMTP_FROM").context("EMAIL_SMTP_FROM is not set")?,
            secure: std::env::var("EMAIL_SMTP_SECURE")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            app_url: app_url.trim_end_matches('/').to_string(),
            notify_timeout,
            jwt,
            smtp,
        })
    }
}

const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Parses lifetimes such as `900`, `45s`, `60m`, `12h` or `7d`.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().context("expected a leading number")?;
    let factor = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => anyhow::bail!("unknown duration unit {other:?}"),
    };
    let secs = value
        .checked_mul(factor)
        .filter(|s| *s <= MAX_DURATION_SECS)
        .with_context(|| format!("duration {raw:?} exceeds one year"))?;
    anyhow::ensure!(secs > 0, "duration must be positive");
    Ok(Duration::from_secs(secs))
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim(), "true" | "TRUE" | "True" | "1")
}
