use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::inventory::DEFAULT_MAX_WRITE_RETRIES;
use crate::ledger::LedgerConfig;
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Staff key, required when `method = "api_key"`.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("boletera.db")
}

/// Seat holds and event writes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReservationConfig {
    #[serde(default = "default_hold_ttl")]
    pub default_hold_ttl_secs: u64,
    #[serde(default = "default_max_hold_ttl")]
    pub max_hold_ttl_secs: u64,
    /// Reload-and-retry rounds after a version conflict.
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,
}

fn default_hold_ttl() -> u64 {
    600 // 10 minutes
}

fn default_max_hold_ttl() -> u64 {
    3600
}

fn default_max_write_retries() -> u32 {
    DEFAULT_MAX_WRITE_RETRIES
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            default_hold_ttl_secs: default_hold_ttl(),
            max_hold_ttl_secs: default_max_hold_ttl(),
            max_write_retries: default_max_write_retries(),
        }
    }
}

impl ReservationConfig {
    pub fn ledger(&self) -> LedgerConfig {
        LedgerConfig {
            default_hold_ttl_secs: self.default_hold_ttl_secs,
            max_hold_ttl_secs: self.max_hold_ttl_secs,
        }
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reservation: ReservationConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_configured: config
                    .auth
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            reservation: config.reservation.clone(),
            scheduler: config.scheduler.clone(),
        }
    }
}
