use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEV_TOKEN_SECRET: &str = "billet-development-secret-change-me";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TOKEN_SECRET must be set when RUST_ENV=production")]
    MissingTokenSecret,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub download_link_ttl: Duration,
    pub public_base_url: String,
    pub allowed_origins: String,
    pub is_production: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = load("PORT", 3001u16);
        let is_production = env::var("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let token_secret = token_secret(env::var("TOKEN_SECRET").ok(), is_production)?;

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        if database_url.is_none() {
            warn!("DATABASE_URL not set, data will be kept in memory only");
        }

        Ok(Self {
            database_url,
            database_max_connections: load("DATABASE_MAX_CONNECTIONS", 5u32),
            port,
            token_secret,
            access_token_ttl: load_ttl("ACCESS_TOKEN_TTL_SECS", 900),
            refresh_token_ttl: load_ttl("REFRESH_TOKEN_TTL_SECS", 604_800),
            download_link_ttl: load_ttl("DOWNLOAD_LINK_TTL_SECS", 172_800),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            is_production,
            bootstrap_admin: bootstrap_admin(),
        })
    }

    /// Defaults suited to tests and local runs: in-memory store, fixed secret.
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            database_max_connections: 1,
            port: 0,
            token_secret: DEV_TOKEN_SECRET.to_string(),
            access_token_ttl: Duration::seconds(900),
            refresh_token_ttl: Duration::seconds(604_800),
            download_link_ttl: Duration::seconds(172_800),
            public_base_url: "http://localhost:3001".to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
            is_production: false,
            bootstrap_admin: None,
        }
    }

    pub fn secret(&self) -> &[u8] {
        self.token_secret.as_bytes()
    }
}

fn load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

/// Outside production a missing secret falls back to the development one.
fn token_secret(raw: Option<String>, is_production: bool) -> Result<String, ConfigError> {
    match raw.filter(|v| !v.trim().is_empty()) {
        Some(secret) => Ok(secret),
        None if is_production => Err(ConfigError::MissingTokenSecret),
        None => {
            warn!("TOKEN_SECRET not set, using the development secret");
            Ok(DEV_TOKEN_SECRET.to_string())
        }
    }
}

fn load_ttl(key: &str, default_secs: i64) -> Duration {
    parse_ttl(key, env::var(key).ok().as_deref(), default_secs)
}

/// A positive number of seconds within chrono's range, else the default.
fn parse_ttl(key: &str, raw: Option<&str>, default_secs: i64) -> Duration {
    let default = Duration::seconds(default_secs);
    let Some(raw) = raw else {
        info!("{key} not set, using default: {default_secs}");
        return default;
    };
    match raw.trim().parse::<i64>().ok().filter(|secs| *secs > 0) {
        Some(secs) => Duration::try_seconds(secs).unwrap_or_else(|| {
            warn!("{key} value '{raw}' is out of range, using default: {default_secs}");
            default
        }),
        None => {
            warn!(
                "Invalid {key} value '{raw}', expected positive seconds, using default: {default_secs}"
            );
            default
        }
    }
}

fn bootstrap_admin() -> Option<BootstrapAdmin> {
    let email = env::var("BOOTSTRAP_ADMIN_EMAIL").ok()?;
    let Ok(password) = env::var("BOOTSTRAP_ADMIN_PASSWORD") else {
        warn!("BOOTSTRAP_ADMIN_EMAIL is set without BOOTSTRAP_ADMIN_PASSWORD, skipping");
        return None;
    };
    let name = env::var("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string());
    Some(BootstrapAdmin {
        name,
        email,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_falls_back_on_garbage() {
        std::env::set_var("BILLET_TEST_PORT_GARBAGE", "not-a-port");
        assert_eq!(load("BILLET_TEST_PORT_GARBAGE", 3001u16), 3001);
        std::env::set_var("BILLET_TEST_PORT_GARBAGE", " 8080 ");
        assert_eq!(load("BILLET_TEST_PORT_GARBAGE", 3001u16), 8080);
        std::env::remove_var("BILLET_TEST_PORT_GARBAGE");
    }

    #[test]
    fn test_production_requires_token_secret() {
        assert_eq!(
            token_secret(None, true),
            Err(ConfigError::MissingTokenSecret)
        );
        assert_eq!(
            token_secret(Some("  ".to_string()), true),
            Err(ConfigError::MissingTokenSecret)
        );
        assert_eq!(
            token_secret(Some("s3cret".to_string()), true).unwrap(),
            "s3cret"
        );
        assert_eq!(token_secret(None, false).unwrap(), DEV_TOKEN_SECRET);
    }

    #[test]
    fn test_ttl_rejects_out_of_range_and_non_positive() {
        let default = Duration::seconds(900);
        assert_eq!(parse_ttl("TTL", None, 900), default);
        assert_eq!(parse_ttl("TTL", Some("60"), 900), Duration::seconds(60));
        assert_eq!(parse_ttl("TTL", Some("0"), 900), default);
        assert_eq!(parse_ttl("TTL", Some("-5"), 900), default);
        assert_eq!(parse_ttl("TTL", Some("soon"), 900), default);
        assert_eq!(parse_ttl("TTL", Some("9223372036854775807"), 900), default);
    }

    #[test]
    fn test_for_tests_uses_memory_store() {
        let config = Config::for_tests();
        assert!(config.database_url.is_none());
        assert!(!config.secret().is_empty());
    }
}
