// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates store and relay settings and provides defaults for optional ones
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    /// Request-log store; the log submission route answers 500 without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_store: Option<StoreConfig>,
    /// Call/dashboard store; the incoming call route answers 500 without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_store: Option<StoreConfig>,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub token: TokenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between keepalive pings on real-time connections
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Seconds of client silence after which a real-time connection is dropped
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ping_interval_secs: default_ping_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Seconds between incoming-call events on each connection
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_sample_caller")]
    pub sample_caller: String,
    #[serde(default = "default_sample_name")]
    pub sample_name: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            sample_caller: default_sample_caller(),
            sample_name: default_sample_name(),
        }
    }
}

/// Connection settings for a PostgREST-style database endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
}

// Custom Debug impl to redact the access key
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("table", &self.table)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Inline service account JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Path to a service account JSON file, used when `credential` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_path: Option<String>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .field("credential_path", &self.credential_path)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_token_ttl_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_ping_interval_secs() -> u64 {
    20
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_interval_secs() -> u64 {
    30
}

fn default_sample_caller() -> String {
    "+1234567890".to_string()
}

fn default_sample_name() -> String {
    "John Doe".to_string()
}

fn default_token_ttl_secs() -> u64 {
    3600 // 1 hour
}

fn default_log_table() -> String {
    "request_logs".to_string()
}

fn default_call_table() -> String {
    "calls".to_string()
}

/// Build a store section from a URL/key env var pair, overriding file values.
/// A section only comes into existence when both variables are set.
fn store_from_env(
    existing: Option<StoreConfig>,
    url_var: &str,
    key_var: &str,
    table_var: &str,
    default_table: fn() -> String,
) -> Option<StoreConfig> {
    let url = std::env::var(url_var).ok();
    let key = std::env::var(key_var).ok();
    let table = std::env::var(table_var).ok();

    let mut store = match (existing, url.clone(), key.clone()) {
        (Some(store), _, _) => store,
        (None, Some(url), Some(api_key)) => StoreConfig {
            url,
            api_key,
            table: default_table(),
        },
        (None, _, _) => return None,
    };

    if let Some(url) = url {
        store.url = url;
    }
    if let Some(key) = key {
        store.api_key = key;
    }
    if let Some(table) = table {
        store.table = table;
    }
    Some(store)
}

fn validate_store(section: &str, store: &StoreConfig) -> Result<()> {
    if store.url.trim().is_empty() {
        anyhow::bail!("{}.url must not be empty", section);
    }
    if store.api_key.trim().is_empty() {
        anyhow::bail!("{}.api_key must not be empty", section);
    }
    if store.table.trim().is_empty() {
        anyhow::bail!("{}.table must not be empty", section);
    }
    Ok(())
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. AGENTLINE_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/agentline/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("AGENTLINE_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from the first config file found, with environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file (or the search path when `None`),
    /// then apply environment variable overrides and validate
    pub fn load_from(explicit_path: Option<&Path>) -> Result<Self> {
        let config_path = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let mut config = if let Some(config_path) = config_path {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        if let Ok(val) = std::env::var("BIND_ADDRESS") {
            config.server.host = val;
        }
        if let Ok(val) = std::env::var("PORT") {
            config.server.port = val
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got: {}", val))?;
        }
        if let Ok(val) = std::env::var("RELAY_INTERVAL_SECS") {
            config.relay.interval_secs = val.parse().with_context(|| {
                format!("RELAY_INTERVAL_SECS must be a valid number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("TOKEN_TTL_SECS") {
            config.token.ttl_secs = val
                .parse()
                .with_context(|| format!("TOKEN_TTL_SECS must be a valid number, got: {}", val))?;
        }

        config.log_store = store_from_env(
            config.log_store.take(),
            "LOG_DB_URL",
            "LOG_DB_KEY",
            "LOG_DB_TABLE",
            default_log_table,
        );
        config.call_store = store_from_env(
            config.call_store.take(),
            "CALL_DB_URL",
            "CALL_DB_KEY",
            "CALL_DB_TABLE",
            default_call_table,
        );

        if let Ok(val) = std::env::var("IDENTITY_SERVICE_ACCOUNT") {
            config.identity.credential = Some(val);
            // Clear from environment to prevent exposure via /proc or child processes
            std::env::remove_var("IDENTITY_SERVICE_ACCOUNT");
        }
        if let Ok(val) = std::env::var("IDENTITY_SERVICE_ACCOUNT_PATH") {
            config.identity.credential_path = Some(val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.relay.interval_secs == 0 {
            anyhow::bail!("relay.interval_secs must be greater than zero");
        }
        if self.server.ping_interval_secs == 0 {
            anyhow::bail!("server.ping_interval_secs must be greater than zero");
        }
        if self.server.idle_timeout_secs <= self.server.ping_interval_secs {
            anyhow::bail!(
                "server.idle_timeout_secs ({}) must exceed server.ping_interval_secs ({})",
                self.server.idle_timeout_secs,
                self.server.ping_interval_secs
            );
        }
        if self.token.ttl_secs == 0 {
            anyhow::bail!("token.ttl_secs must be greater than zero");
        }
        if let Some(ref store) = self.log_store {
            validate_store("log_store", store)?;
        }
        if let Some(ref store) = self.call_store {
            validate_store("call_store", store)?;
        }
        Ok(())
    }

    /// Address string the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn relay_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.relay.interval_secs)
    }
}
