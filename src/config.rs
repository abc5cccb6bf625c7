use std::{fmt::Display, net::SocketAddr, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Lifetime used when the caller asks to be remembered, e.g. `7d`.
    pub expires_in: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_entry_bytes: usize,
    /// Entry ceiling of the in-process backend.
    pub max_items: usize,
    pub redis_url: Option<String>,
}

/// Per-client request budget on the auth routes.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub ttl_seconds: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub cache: CacheConfig,
    pub throttle: ThrottleConfig,
    pub server: ServerConfig,
}

/// Unset (or blank) falls back to `default`; a value that does not parse is an error.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value {v:?}: {e}")),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let secret = var("JWT_SECRET").context("JWT_SECRET is not set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");

        let jwt = JwtConfig {
            secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "userdir".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "userdir-clients".into()),
            expires_in: var("JWT_EXPIRES_IN").unwrap_or_else(|| "7d".into()),
        };
        humantime::parse_duration(&jwt.expires_in)
            .with_context(|| format!("JWT_EXPIRES_IN is not a duration: {}", jwt.expires_in))?;

        let hash = HashConfig {
            cost: parse_or("HASH_COST", var("HASH_COST"), 13)?,
        };
        anyhow::ensure!(hash.cost >= 1, "HASH_COST must be at least 1");

        let cache = CacheConfig {
            ttl_seconds: parse_or("CACHE_TTL_SECONDS", var("CACHE_TTL_SECONDS"), 60)?,
            max_entry_bytes: parse_or(
                "CACHE_MAX_ENTRY_BYTES",
                var("CACHE_MAX_ENTRY_BYTES"),
                100 * 1024,
            )?,
            max_items: parse_or("CACHE_MAX_ITEMS", var("CACHE_MAX_ITEMS"), 100)?,
            redis_url: var("REDIS_URL").filter(|v| !v.is_empty()),
        };
        anyhow::ensure!(cache.max_items >= 1, "CACHE_MAX_ITEMS must be at least 1");

        let throttle = ThrottleConfig {
            ttl_seconds: parse_or("THROTTLE_TTL", var("THROTTLE_TTL"), 60)?,
            limit: parse_or("THROTTLE_LIMIT", var("THROTTLE_LIMIT"), 10)?,
        };
        anyhow::ensure!(
            throttle.ttl_seconds >= 1 && throttle.limit >= 1,
            "THROTTLE_TTL and THROTTLE_LIMIT must be at least 1"
        );

        let server = ServerConfig {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or("APP_PORT", var("APP_PORT"), 8080)?,
        };
        server.addr()?;

        Ok(Self {
            database_url,
            jwt,
            hash,
            cache,
            throttle,
            server,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("DATABASE_URL".to_string(), "postgres://localhost/userdir".to_string()),
            ("JWT_SECRET".to_string(), "secret".to_string()),
        ]);
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_values_use_defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.hash.cost, 13);
        assert_eq!(cfg.cache.ttl_seconds, 60);
        assert_eq!(cfg.cache.max_entry_bytes, 102_400);
        assert_eq!(cfg.cache.max_items, 100);
        assert_eq!(cfg.throttle.ttl_seconds, 60);
        assert_eq!(cfg.throttle.limit, 10);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.jwt.expires_in, "7d");
        assert!(cfg.cache.redis_url.is_none());
    }

    #[test]
    fn set_values_override_defaults() {
        let cfg = load(&[("HASH_COST", "4"), ("CACHE_TTL_SECONDS", "5"), ("APP_PORT", "9000")])
            .unwrap();
        assert_eq!(cfg.hash.cost, 4);
        assert_eq!(cfg.cache.ttl_seconds, 5);
        assert_eq!(cfg.server.port, 9000);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = load(&[("HASH_COST", "  ")]).unwrap();
        assert_eq!(cfg.hash.cost, 13);
    }

    #[test]
    fn unparsable_numbers_fail() {
        for (key, value) in [
            ("HASH_COST", "thirteen"),
            ("CACHE_TTL_SECONDS", "-5"),
            ("CACHE_MAX_ENTRY_BYTES", "lots"),
            ("CACHE_MAX_ITEMS", "1.5"),
            ("THROTTLE_TTL", "1m"),
            ("THROTTLE_LIMIT", "-1"),
            ("APP_PORT", "70000"),
        ] {
            let err = load(&[(key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn zero_bounds_fail() {
        assert!(load(&[("HASH_COST", "0")]).is_err());
        assert!(load(&[("CACHE_MAX_ITEMS", "0")]).is_err());
        assert!(load(&[("THROTTLE_LIMIT", "0")]).is_err());
    }

    #[test]
    fn required_values_are_enforced() {
        let none = AppConfig::from_lookup(|_| None);
        assert!(none.is_err());
        assert!(load(&[("JWT_SECRET", " ")]).is_err());
        assert!(load(&[("JWT_EXPIRES_IN", "forever")]).is_err());
    }
}
