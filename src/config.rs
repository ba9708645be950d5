//! Runtime configuration.
//!
//! Everything is read once in `main` (after `.env` is loaded) and handed to
//! the services by value. Nothing below `main` touches the environment.

use std::env;
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_ACCESS_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_RESET_TTL_SECS: i64 = 10 * 60;
const DEFAULT_HASH_ITERATIONS: u32 = 260_000;
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0}")]
    Rule(&'static str),
}

/// Secrets and lifetimes used by the token service, the password hasher and
/// the cookie layer.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Signs access tokens (`JWT_SECRET_KEY`).
    pub access_secret: String,
    /// Signs refresh tokens (`JWT_REFRESH_SECRET`). Must differ from the access secret.
    pub refresh_secret: String,
    /// Access token lifetime in seconds, also the `token` cookie max-age.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds, also the `refreshToken` cookie max-age.
    pub refresh_ttl_secs: i64,
    /// Password reset ticket lifetime in seconds.
    pub reset_ttl_secs: i64,
    /// PBKDF2 work factor.
    pub hash_iterations: u32,
    /// Adds the `Secure` attribute to session cookies.
    pub secure_cookies: bool,
}

impl AuthConfig {
    /// Config with the default lifetimes and work factor.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            reset_ttl_secs: DEFAULT_RESET_TTL_SECS,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
            secure_cookies: false,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            access_secret: required("JWT_SECRET_KEY")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
            access_ttl_secs: parsed_or("JWT_EXPIRES_IN_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            refresh_ttl_secs: parsed_or("JWT_REFRESH_EXPIRES_IN_SECS", DEFAULT_REFRESH_TTL_SECS)?,
            reset_ttl_secs: parsed_or("RESET_TOKEN_TTL_SECS", DEFAULT_RESET_TTL_SECS)?,
            hash_iterations: parsed_or("PASSWORD_HASH_ITERATIONS", DEFAULT_HASH_ITERATIONS)?,
            secure_cookies: env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Rule("JWT_SECRET_KEY must be at least 32 bytes"));
        }
        if self.refresh_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Rule("JWT_REFRESH_SECRET must be at least 32 bytes"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::Rule(
                "JWT_SECRET_KEY and JWT_REFRESH_SECRET must be different",
            ));
        }
        if self.access_ttl_secs <= 0 || self.reset_ttl_secs <= 0 {
            return Err(ConfigError::Rule("token lifetimes must be positive"));
        }
        if self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err(ConfigError::Rule(
                "refresh token lifetime must exceed the access token lifetime",
            ));
        }
        if self.hash_iterations == 0 {
            return Err(ConfigError::Rule("PASSWORD_HASH_ITERATIONS must be positive"));
        }
        Ok(())
    }
}

/// Process-level settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed_or("PORT", 8800)?,
            auth: AuthConfig::from_env()?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthConfig {
        AuthConfig::new("a".repeat(32), "b".repeat(32))
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.access_ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.refresh_ttl_secs, 30 * 24 * 60 * 60);
        assert_eq!(config.reset_ttl_secs, 600);
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = AuthConfig::new("short", "b".repeat(32));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_secret_rejected() {
        let config = AuthConfig::new("x".repeat(40), "x".repeat(40));
        assert_eq!(
            config.validate(),
            Err(ConfigError::Rule(
                "JWT_SECRET_KEY and JWT_REFRESH_SECRET must be different"
            ))
        );
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let mut config = valid();
        config.refresh_ttl_secs = config.access_ttl_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut config = valid();
        config.hash_iterations = 0;
        assert!(config.validate().is_err());
    }
}
