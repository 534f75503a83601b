//! Runtime configuration, read from environment variables.
//!
//! `main` loads an optional `.env` file first, so every key below can also
//! live there.

use std::net::SocketAddr;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use painterp_invoicing::DEFAULT_TAX_RATE;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when APP_ENV=production")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid {
                key: "APP_ENV",
                reason: format!("expected development or production, got {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub environment: Environment,
    pub default_tax_rate: Decimal,
}

impl AppConfig {
    /// Development settings with the in-memory store.
    pub fn development(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            environment: Environment::Development,
            default_tax_rate: DEFAULT_TAX_RATE,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("APP_ENV") {
            Some(raw) => raw.parse()?,
            None => Environment::Development,
        };

        let bind_addr: SocketAddr = parse_or(get("BIND_ADDR"), "BIND_ADDR", || {
            DEFAULT_BIND_ADDR.parse().map_err(|e| format!("{e}"))
        })?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let default_tax_rate: Decimal =
            parse_or(get("DEFAULT_TAX_RATE"), "DEFAULT_TAX_RATE", || Ok(DEFAULT_TAX_RATE))?;
        if default_tax_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_TAX_RATE",
                reason: "must not be negative".to_string(),
            });
        }

        let database_max_connections: u32 = parse_or(
            get("DATABASE_MAX_CONNECTIONS"),
            "DATABASE_MAX_CONNECTIONS",
            || Ok(DEFAULT_MAX_CONNECTIONS),
        )?;
        if database_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            environment,
            default_tax_rate,
        })
    }
}

fn parse_or<T>(
    raw: Option<String>,
    key: &'static str,
    default: impl FnOnce() -> Result<T, String>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = match raw {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| e.to_string()),
        None => default(),
    };
    parsed.map_err(|reason| ConfigError::Invalid { key, reason })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.default_tax_rate, Decimal::from(18));
        assert_eq!(config.database_max_connections, 5);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn production_requires_a_jwt_secret() {
        let err = config_from(&[("APP_ENV", "production")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));

        let config = config_from(&[("APP_ENV", "production"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert!(config.environment.is_production());
        assert_eq!(config.jwt_secret, "s3cret");
    }

    #[test]
    fn explicit_values_are_parsed() {
        let config = config_from(&[
            ("BIND_ADDR", "127.0.0.1:8081"),
            ("DATABASE_URL", "postgres://localhost/paint"),
            ("DEFAULT_TAX_RATE", "12.5"),
            ("DATABASE_MAX_CONNECTIONS", "10"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8081);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/paint"));
        assert_eq!(config.default_tax_rate, Decimal::new(125, 1));
        assert_eq!(config.database_max_connections, 10);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = config_from(&[("DATABASE_URL", "  "), ("APP_ENV", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("DEFAULT_TAX_RATE", "-1")]),
            Err(ConfigError::Invalid { key: "DEFAULT_TAX_RATE", .. })
        ));
        assert!(matches!(
            config_from(&[("BIND_ADDR", "not-an-addr")]),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));
        assert!(matches!(
            config_from(&[("APP_ENV", "staging")]),
            Err(ConfigError::Invalid { key: "APP_ENV", .. })
        ));
        assert!(matches!(
            config_from(&[("DATABASE_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::Invalid { key: "DATABASE_MAX_CONNECTIONS", .. })
        ));
    }
}
