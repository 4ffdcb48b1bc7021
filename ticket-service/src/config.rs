//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `TICKET_SERVICE_`, nesting separator `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/ticket-service/config.toml
//! 4. System directory: /etc/ticket-service/config.toml
//! 5. Default values
//!
//! For example `TICKET_SERVICE_SERVICE__ENVIRONMENT=production` switches the
//! error rendering and log format to production mode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Application name used for config directories
pub const APP_NAME: &str = "ticket-service";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "TICKET_SERVICE_";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Declared runtime mode, selecting error rendering and log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Full error detail in responses, human-readable logs
    #[default]
    #[serde(alias = "dev")]
    Development,
    /// Redacted unexpected errors, JSON logs
    #[serde(alias = "prod")]
    Production,
}

impl RuntimeMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Runtime mode
    #[serde(default)]
    pub environment: RuntimeMode,
}

/// Middleware configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request body size limit in KB
    #[serde(default = "default_body_limit_kb")]
    pub body_limit_kb: usize,

    /// Enable response compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// Origins allowed by CORS, with credentials; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Security response headers
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_kb: default_body_limit_kb(),
            compression: true,
            allowed_origins: Vec::new(),
            catch_panic: true,
            security_headers: SecurityHeadersConfig::default(),
        }
    }
}

/// Security response headers; an empty value disables that header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Send `X-Content-Type-Options: nosniff`
    #[serde(default = "default_true")]
    pub x_content_type_options: bool,

    #[serde(default = "default_frame_options")]
    pub x_frame_options: String,

    /// Send `X-XSS-Protection: 0`
    #[serde(default = "default_true")]
    pub x_xss_protection: bool,

    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,

    #[serde(default)]
    pub permissions_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            x_content_type_options: true,
            x_frame_options: default_frame_options(),
            x_xss_protection: true,
            referrer_policy: default_referrer_policy(),
            permissions_policy: None,
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON array of tickets inserted at startup
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_body_limit_kb() -> usize {
    10
}

fn default_frame_options() -> String {
    "DENY".to_string()
}

fn default_referrer_policy() -> String {
    "no-referrer".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Files are merged lowest priority first, so `./config.toml` overrides
    /// the XDG file, which overrides `/etc`. Environment variables override
    /// all file-based configs.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        Ok(figment.merge(Self::env()).extract()?)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the search path; environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env())
            .extract()?)
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    /// Config file paths in priority order (highest first)
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_NAME);
        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc").join(APP_NAME).join("config.toml"));
        paths
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    /// Request body limit in bytes
    pub fn body_limit_bytes(&self) -> usize {
        self.middleware.body_limit_kb.saturating_mul(1024)
    }

    pub fn mode(&self) -> RuntimeMode {
        self.service.environment
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: APP_NAME.to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: RuntimeMode::default(),
            },
            middleware: MiddlewareConfig::default(),
            store: StoreConfig::default(),
        }
    }
}
