//! Configuration management for Sanare.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides for deployment secrets.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// Loaded from `~/.config/sanare/config.toml` (or platform equivalent).
/// Missing file means defaults; secrets come from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// License registry scraping settings
    pub registry: RegistryConfig,
    /// Identity verification provider settings
    pub kyc: KycConfig,
    /// Verification email settings
    pub mail: MailConfig,
    /// Fixed-window rate limit settings
    pub rate_limits: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if the config directory cannot be determined, the file
    /// exists but cannot be read, or the contents are not valid TOML.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supported variables:
    /// - `SANARE_DATABASE_PATH`: database file location
    /// - `SANARE_KYC_API_KEY`: provider API key (never stored in the file)
    /// - `SANARE_KYC_WEBHOOK_SECRET`: shared secret for webhook delivery
    /// - `SANARE_SMTP_PASSWORD`: SMTP credential
    /// - `SANARE_HEADLESS`: browser headless mode (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("SANARE_DATABASE_PATH") {
            config.database.path = val;
        }
        if let Ok(val) = std::env::var("SANARE_KYC_API_KEY") {
            config.kyc.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("SANARE_KYC_WEBHOOK_SECRET") {
            config.kyc.webhook_secret = Some(val);
        }
        if let Ok(val) = std::env::var("SANARE_SMTP_PASSWORD") {
            config.mail.smtp_password = Some(val);
        }
        if let Ok(val) = std::env::var("SANARE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                config.registry.headless = headless;
            }
        }

        Ok(config)
    }

    /// Save configuration to disk, creating the directory if needed.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("health", "sanare", "sanare").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path (default database location).
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("health", "sanare", "sanare").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Base URL of the frontend, used to build callback redirect targets
    pub frontend_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            frontend_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file, or `:memory:`
    pub path: String,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "sanare.db".to_string(),
            max_connections: 5,
        }
    }
}

/// License registry scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry search page URL
    pub search_url: String,
    /// Run browser in headless mode
    pub headless: bool,
    /// Per-navigation-step timeout in seconds
    pub step_timeout_secs: u64,
    /// Bounded wait for the optional specialty control, in seconds
    pub specialty_probe_timeout_secs: u64,
    /// Overall deadline for a single lookup, in seconds
    pub overall_deadline_secs: u64,
    /// Cache TTL for successful lookups, in hours
    pub cache_ttl_hours: i64,
    /// Upper bound on concurrent browser sessions
    pub max_concurrent_lookups: usize,
    /// How long a lookup may queue for a browser slot before being rejected, in seconds
    pub queue_grace_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            search_url: "https://registry.example.gob/prestadores/busqueda".to_string(),
            headless: true,
            step_timeout_secs: 30,
            specialty_probe_timeout_secs: 15,
            overall_deadline_secs: 90,
            cache_ttl_hours: 12,
            max_concurrent_lookups: 3,
            queue_grace_secs: 5,
        }
    }
}

/// Identity verification provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KycConfig {
    /// Provider API base URL
    pub base_url: String,
    /// API key; loaded from `SANARE_KYC_API_KEY`, never written to disk
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Workflow the provider should run for new sessions
    pub workflow_id: String,
    /// URL the provider redirects users to after the flow
    pub callback_url: String,
    /// Shared secret expected on inbound webhooks; `None` disables the check
    #[serde(skip)]
    pub webhook_secret: Option<String>,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            base_url: "https://verification.didit.me/v2".to_string(),
            api_key: None,
            workflow_id: String::new(),
            callback_url: "http://localhost:8080/api/v1/identity/callback".to_string(),
            webhook_secret: None,
            timeout_secs: 30,
        }
    }
}

/// Verification email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password; loaded from `SANARE_SMTP_PASSWORD`
    #[serde(skip)]
    pub smtp_password: Option<String>,
    /// From address on verification emails
    pub from_address: String,
    /// Verification code lifetime in minutes
    pub code_ttl_minutes: i64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: None,
            from_address: "no-reply@sanare.example".to_string(),
            code_ttl_minutes: 15,
        }
    }
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length for email-code requests, in seconds
    pub email_window_secs: i64,
    /// Max email-code requests per window per key
    pub email_max_per_window: i64,
    /// Window length for registry lookups, in seconds
    pub lookup_window_secs: i64,
    /// Max registry lookups per window per key
    pub lookup_max_per_window: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            email_window_secs: 3600,
            email_max_per_window: 5,
            lookup_window_secs: 3600,
            lookup_max_per_window: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.registry.specialty_probe_timeout_secs, 15);
        assert_eq!(config.registry.max_concurrent_lookups, 3);
        assert!(config.registry.headless);
        assert!(config.kyc.api_key.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[rate_limits]"));
        // Secrets are never serialized
        assert!(!toml_str.contains("api_key"));
        assert!(!toml_str.contains("smtp_password"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml_str = r#"
[server]
port = 9090

[registry]
cache_ttl_hours = 6
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.registry.cache_ttl_hours, 6);
        assert_eq!(config.registry.overall_deadline_secs, 90);
        assert_eq!(config.rate_limits.email_max_per_window, 5);
    }
}
