//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::backend::RestBackendConfig;
use crate::contact::ContactSettings;
use crate::parse_duration;

/// Prefix for environment overrides, e.g. `ARENA__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "ARENA";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to load config: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Which data backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process tables, empty on start
    #[default]
    Memory,
    /// Hosted PostgREST API
    Rest,
}

/// Data backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Project URL of the hosted database
    #[serde(default)]
    pub url: String,

    /// Public API key
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: String::new(),
            api_key: String::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Prebuilt frontend served for non-API paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            static_dir: None,
        }
    }
}

/// Transactional email configuration. With no API key, mail is only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_user_from")]
    pub user_from: String,

    #[serde(default = "default_admin_from")]
    pub admin_from: String,

    #[serde(default = "default_admin_address")]
    pub admin_address: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_email_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_user_from() -> String {
    "AV ARENA <onboarding@resend.dev>".to_string()
}

fn default_admin_from() -> String {
    "AV ARENA Contact Form <onboarding@resend.dev>".to_string()
}

fn default_admin_address() -> String {
    "admin@localhost".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: default_email_api_url(),
            api_key: String::new(),
            user_from: default_user_from(),
            admin_from: default_admin_from(),
            admin_address: default_admin_address(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Change detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// How often the REST backend is polled, e.g. "5s"
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            email: EmailConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an optional TOML file, then apply `ARENA__`-prefixed
    /// environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::ReadError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )));
            }
            builder = builder.add_source(config::File::new(
                &path.to_string_lossy(),
                config::FileFormat::Toml,
            ));
        }
        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.backend.timeout_seconds == 0 || self.email.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.backend.kind == BackendKind::Rest {
            if self.backend.url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "backend.url is required for the rest backend".to_string(),
                ));
            }
            Url::parse(&self.backend.url).map_err(|e| {
                ConfigError::ValidationError(format!("backend.url is not a valid URL: {}", e))
            })?;
        }

        match parse_duration(&self.realtime.poll_interval) {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid poll interval: {}",
                    self.realtime.poll_interval
                )))
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        parse_duration(&self.realtime.poll_interval).unwrap_or(Duration::from_secs(5))
    }

    pub fn rest_backend(&self) -> Result<RestBackendConfig, ConfigError> {
        let base_url = Url::parse(&self.backend.url)
            .map_err(|e| ConfigError::ValidationError(format!("backend.url: {}", e)))?;
        Ok(RestBackendConfig {
            base_url,
            api_key: self.backend.api_key.clone(),
            timeout: Duration::from_secs(self.backend.timeout_seconds),
        })
    }

    pub fn contact_settings(&self) -> ContactSettings {
        ContactSettings {
            user_from: self.email.user_from.clone(),
            admin_from: self.email.admin_from.clone(),
            admin_address: self.email.admin_address.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.email.api_key.is_empty());
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rest_needs_url() {
        let mut config = AppConfig::default();
        config.backend.kind = BackendKind::Rest;
        assert!(config.validate().is_err());

        config.backend.url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.backend.url = "https://abc.supabase.co".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.rest_backend().unwrap().base_url.as_str(),
            "https://abc.supabase.co/"
        );
    }

    #[test]
    fn test_config_validation_bad_poll_interval() {
        let mut config = AppConfig::default();
        config.realtime.poll_interval = "0s".to_string();
        assert!(config.validate().is_err());

        config.realtime.poll_interval = "soon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[server]
port = 9000

[backend]
kind = "rest"
url = "https://abc.supabase.co"
api_key = "anon"

[realtime]
poll_interval = "1m"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.backend.kind, BackendKind::Rest);
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.toml");
        std::fs::write(&path, "[email]\nadmin_address = \"ops@example.com\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.email.admin_address, "ops@example.com");
        assert_eq!(config.contact_settings().admin_address, "ops@example.com");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server.port, parsed.server.port);
        assert_eq!(config.realtime.poll_interval, parsed.realtime.poll_interval);
    }
}
