use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::matching::cache::DEFAULT_CACHE_TTL_SECS;
use crate::matching::engine::{MatchingSettings, DEFAULT_MAX_RESULTS};
use crate::matching::terminology::ConditionMatchMode;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub matching: MatchingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            matching: MatchingConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Protocol cache, upstream fetch, and matching defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub cache_ttl_secs: u64,
    pub fetch_timeout_ms: u64,
    pub default_max_results: usize,
    pub condition_mode: ConditionMatchMode,
    pub catalog_path: Option<PathBuf>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS as u64,
            fetch_timeout_ms: 5_000,
            default_max_results: DEFAULT_MAX_RESULTS,
            condition_mode: ConditionMatchMode::default(),
            catalog_path: None,
        }
    }
}

impl MatchingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cache_ttl_secs = numeric_var("MATCHING_CACHE_TTL_SECS", defaults.cache_ttl_secs)?;
        let fetch_timeout_ms = numeric_var("MATCHING_FETCH_TIMEOUT_MS", defaults.fetch_timeout_ms)?;
        let default_max_results =
            numeric_var("MATCHING_DEFAULT_MAX_RESULTS", defaults.default_max_results)?;
        if default_max_results == 0 || fetch_timeout_ms == 0 {
            let variable = if default_max_results == 0 {
                "MATCHING_DEFAULT_MAX_RESULTS"
            } else {
                "MATCHING_FETCH_TIMEOUT_MS"
            };
            return Err(ConfigError::InvalidNumber {
                variable,
                value: "0".to_string(),
            });
        }

        let condition_mode = match env::var("MATCHING_CONDITION_MODE") {
            Ok(value) => ConditionMatchMode::parse(&value)
                .ok_or(ConfigError::InvalidConditionMode { value })?,
            Err(_) => defaults.condition_mode,
        };

        let catalog_path = env::var("PROTOCOL_CATALOG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            cache_ttl_secs,
            fetch_timeout_ms,
            default_max_results,
            condition_mode,
            catalog_path,
        })
    }

    pub fn settings(&self) -> MatchingSettings {
        MatchingSettings {
            default_max_results: self.default_max_results,
            condition_mode: self.condition_mode,
            cache_ttl: i64::try_from(self.cache_ttl_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(chrono::Duration::MAX),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
        }
    }
}

fn numeric_var<T: std::str::FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable, value }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    InvalidConditionMode { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a positive integer, got '{value}'")
            }
            ConfigError::InvalidConditionMode { value } => write!(
                f,
                "MATCHING_CONDITION_MODE must be coded, coded_with_fallback, or substring, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidConditionMode { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "MATCHING_CACHE_TTL_SECS",
            "MATCHING_FETCH_TIMEOUT_MS",
            "MATCHING_DEFAULT_MAX_RESULTS",
            "MATCHING_CONDITION_MODE",
            "PROTOCOL_CATALOG_PATH",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.matching, MatchingConfig::default());

        let settings = config.matching.settings();
        assert_eq!(settings.default_max_results, 10);
        assert_eq!(settings.cache_ttl, chrono::Duration::minutes(10));
        assert_eq!(settings.fetch_timeout, Duration::from_secs(5));
        assert_eq!(settings.condition_mode, ConditionMatchMode::CodedWithFallback);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_matching_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MATCHING_CACHE_TTL_SECS", "30");
        env::set_var("MATCHING_DEFAULT_MAX_RESULTS", "3");
        env::set_var("MATCHING_CONDITION_MODE", "coded");
        env::set_var("PROTOCOL_CATALOG_PATH", "/etc/oncomatch/protocols.json");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.matching.cache_ttl_secs, 30);
        assert_eq!(config.matching.default_max_results, 3);
        assert_eq!(config.matching.condition_mode, ConditionMatchMode::Coded);
        assert_eq!(
            config.matching.catalog_path,
            Some(PathBuf::from("/etc/oncomatch/protocols.json"))
        );
        reset_env();
    }

    #[test]
    fn rejects_unknown_condition_mode() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MATCHING_CONDITION_MODE", "fuzzy");
        let error = AppConfig::load().expect_err("unknown mode rejected");
        assert!(matches!(error, ConfigError::InvalidConditionMode { ref value } if value == "fuzzy"));
        reset_env();
    }

    #[test]
    fn rejects_zero_or_garbage_numbers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MATCHING_DEFAULT_MAX_RESULTS", "0");
        let error = AppConfig::load().expect_err("zero max results rejected");
        assert!(matches!(
            error,
            ConfigError::InvalidNumber {
                variable: "MATCHING_DEFAULT_MAX_RESULTS",
                ..
            }
        ));

        reset_env();
        env::set_var("MATCHING_FETCH_TIMEOUT_MS", "soon");
        let error = AppConfig::load().expect_err("non-numeric timeout rejected");
        assert!(error.to_string().contains("MATCHING_FETCH_TIMEOUT_MS"));
        reset_env();
    }
}
