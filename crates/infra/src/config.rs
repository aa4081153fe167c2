//! Configuration loading and representation.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `STORE_BACKEND` | `sqlite` (`sqlite`, `postgres`, `memory`) |
//! | `DATABASE_URL` | `sqlite://stockalloc.db` |
//! | `ALLOCATION_MAX_ATTEMPTS` | `3` |
//! | `REPOSITORY_TIMEOUT_MS` | `5000` |
//!
//! Unset variables take their default; set but unparsable ones are errors.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::allocation_service::ServiceConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://stockalloc.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Which `BatchRepository` implementation backs the service.
///
/// `Memory` loses everything on restart; it is for dev and tests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend {other:?}")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::Postgres => "postgres",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub database_url: String,
    pub service: ServiceConfig,
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServiceConfig::default();

        let bind_addr = parse_or("BIND_ADDR", &lookup, || {
            SocketAddr::from(([0, 0, 0, 0], 8080))
        })?;
        let store = parse_or("STORE_BACKEND", &lookup, StoreBackend::default)?;
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_attempts: u32 =
            parse_or("ALLOCATION_MAX_ATTEMPTS", &lookup, || defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::invalid(
                "ALLOCATION_MAX_ATTEMPTS",
                "0",
                "must be at least 1",
            ));
        }

        let timeout_ms: u64 = parse_or("REPOSITORY_TIMEOUT_MS", &lookup, || {
            defaults.timeout.as_millis() as u64
        })?;
        if timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "REPOSITORY_TIMEOUT_MS",
                "0",
                "must be positive",
            ));
        }

        Ok(Self {
            bind_addr,
            store,
            database_url,
            service: ServiceConfig {
                max_attempts,
                timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

fn parse_or<T>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(var, &raw, e)),
        _ => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();

        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.store, StoreBackend::Sqlite);
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.service, ServiceConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("STORE_BACKEND", "SQLite"),
            ("DATABASE_URL", "sqlite:///tmp/alloc.db"),
            ("ALLOCATION_MAX_ATTEMPTS", "5"),
            ("REPOSITORY_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.store, StoreBackend::Sqlite);
        assert_eq!(cfg.database_url, "sqlite:///tmp/alloc.db");
        assert_eq!(cfg.service.max_attempts, 5);
        assert_eq!(cfg.service.timeout, Duration::from_millis(250));
    }

    #[test]
    fn memory_store_is_opt_in() {
        assert_eq!(config(&[]).unwrap().store, StoreBackend::Sqlite);
        assert_eq!(
            config(&[("STORE_BACKEND", "memory")]).unwrap().store,
            StoreBackend::Memory
        );
    }

    #[test]
    fn unparsable_values_are_errors() {
        assert!(matches!(
            config(&[("STORE_BACKEND", "mongo")]),
            Err(ConfigError::Invalid { var: "STORE_BACKEND", .. })
        ));
        assert!(matches!(
            config(&[("BIND_ADDR", "not-an-addr")]),
            Err(ConfigError::Invalid { var: "BIND_ADDR", .. })
        ));
        assert!(matches!(
            config(&[("REPOSITORY_TIMEOUT_MS", "-1")]),
            Err(ConfigError::Invalid { var: "REPOSITORY_TIMEOUT_MS", .. })
        ));
    }

    #[test]
    fn zero_attempts_or_timeout_are_rejected() {
        assert!(config(&[("ALLOCATION_MAX_ATTEMPTS", "0")]).is_err());
        assert!(config(&[("REPOSITORY_TIMEOUT_MS", "0")]).is_err());
    }
}
