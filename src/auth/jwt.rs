use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, users::repo_types::Role};

/// Lifetime of a token issued without `rememberMe`.
pub const SESSION_TTL: &str = "1d";

/// Identity carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token is missing identity claims")]
    MissingClaims,
}

/// A token lifetime together with the label reported to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ttl {
    pub label: String,
    pub duration: Duration,
}

impl Ttl {
    pub fn parse(label: &str) -> anyhow::Result<Self> {
        let duration = humantime::parse_duration(label)
            .map_err(|e| anyhow::anyhow!("invalid token ttl {label:?}: {e}"))?;
        Ok(Self {
            label: label.to_string(),
            duration,
        })
    }
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    remember_ttl: Ttl,
    session_ttl: Ttl,
}

impl TokenService {
    pub fn new(cfg: &JwtConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!cfg.secret.trim().is_empty(), "jwt secret must not be empty");
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            remember_ttl: Ttl::parse(&cfg.expires_in)?,
            session_ttl: Ttl::parse(SESSION_TTL)?,
        })
    }

    /// Configured long lifetime when remembered, the fixed session one otherwise.
    pub fn ttl(&self, remember_me: bool) -> &Ttl {
        if remember_me {
            &self.remember_ttl
        } else {
            &self.session_ttl
        }
    }

    pub fn issue(&self, payload: &TokenPayload, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: payload.sub.to_string(),
            email: payload.email.clone(),
            role: payload.role.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %payload.sub, ttl_secs = ttl.as_secs(), "jwt signed");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;
        let claims = data.claims;

        if claims.sub.is_empty() || claims.email.is_empty() || claims.role.is_empty() {
            return Err(TokenError::MissingClaims);
        }
        let sub = Uuid::parse_str(&claims.sub)
            .map_err(|_| TokenError::Invalid("subject is not a uuid".into()))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        debug!(user_id = %sub, "jwt verified");
        Ok(TokenPayload {
            sub,
            email: claims.email,
            role,
        })
    }
}
