use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::de::DeserializeOwned;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::claims::{ResetClaims, SessionClaims, TokenKind},
    config::JwtConfig,
};

/// Lifetime of password-reset tokens.
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Lifetime of activation tokens.
pub const ACTIVATION_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const ACTIVATION_TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("wrong token type")]
    WrongType,
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("token lifetime out of range")]
    Lifetime,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    session_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            session_ttl: config.expires_in,
        }
    }

    pub fn issue_session(&self, user_id: i64, token_version: i32) -> Result<String, TokenError> {
        self.issue_session_at(user_id, token_version, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_session_at(
        &self,
        user_id: i64,
        token_version: i32,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let (iat, exp) = window(now, self.session_ttl)?;
        let claims = SessionClaims {
            sub: user_id,
            token_version,
            kind: TokenKind::Session,
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        debug!(user_id, token_version, "session jwt signed");
        Ok(token)
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let claims: SessionClaims = self.decode(token)?;
        if claims.kind != TokenKind::Session {
            return Err(TokenError::WrongType);
        }
        debug!(user_id = claims.sub, "session jwt verified");
        Ok(claims)
    }

    pub fn issue_reset_token(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue_reset_token_at(user_id, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_reset_token_at(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let (iat, exp) = window(now, RESET_TOKEN_TTL)?;
        let claims = ResetClaims {
            sub: user_id,
            kind: TokenKind::ResetPassword,
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        debug!(user_id, "reset jwt signed");
        Ok(token)
    }

    pub fn verify_reset_token(&self, token: &str) -> Result<ResetClaims, TokenError> {
        let claims: ResetClaims = self.decode(token)?;
        if claims.kind != TokenKind::ResetPassword {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        decode::<T>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    debug!(error = %e, "jwt rejected");
                    TokenError::Invalid
                }
            })
    }
}

fn window(now: OffsetDateTime, ttl: Duration) -> Result<(usize, usize), TokenError> {
    let exp = TimeDuration::try_from(ttl)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or(TokenError::Lifetime)?;
    let iat = usize::try_from(now.unix_timestamp()).map_err(|_| TokenError::Lifetime)?;
    let exp = usize::try_from(exp.unix_timestamp()).map_err(|_| TokenError::Lifetime)?;
    Ok((iat, exp))
}

/// Opaque activation token: 32 bytes from the OS CSPRNG, hex-encoded.
pub fn generate_activation_token() -> String {
    let mut bytes = [0u8; ACTIVATION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
