use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "DEVEVENT_ENV";
const CONFIG_DIR_ENV: &str = "DEVEVENT_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub listing: ListingSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("DEVEVENT")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// `mem://` or `surrealkv://<path>`
    #[serde(default = "DatabaseSettings::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "DatabaseSettings::default_namespace")]
    pub namespace: String,
    #[serde(default = "DatabaseSettings::default_database")]
    pub database: String,
}

impl DatabaseSettings {
    fn default_endpoint() -> String {
        "surrealkv://data/devevent.db".to_string()
    }

    fn default_namespace() -> String {
        "devevent".to_string()
    }

    fn default_database() -> String {
        "core".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            namespace: Self::default_namespace(),
            database: Self::default_database(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// A dashboard account accepted by the credentials login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub users: Vec<UserCredentials>,
}

impl AuthSettings {
    fn default_session_ttl_secs() -> u64 {
        60 * 60 * 24
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_secs: Self::default_session_ttl_secs(),
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSettings {
    #[serde(default = "ListingSettings::default_limit")]
    pub default_limit: u64,
    #[serde(default = "ListingSettings::default_max_limit")]
    pub max_limit: u64,
}

impl ListingSettings {
    fn default_limit() -> u64 {
        5
    }

    fn default_max_limit() -> u64 {
        100
    }
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            default_limit: Self::default_limit(),
            max_limit: Self::default_max_limit(),
        }
    }
}
