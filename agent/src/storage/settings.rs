//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deploy::retry::RetryPolicy;
use crate::errors::UploadError;
use crate::logs::LogLevel;
use crate::utils::CooldownOptions;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/pushagent/settings.json";

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Optional directory for a rolling log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Control plane configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Docker CLI configuration
    #[serde(default)]
    pub docker: DockerSettings,

    /// Push backoff configuration
    #[serde(default)]
    pub retry: RetrySettings,

    /// Upper bound for the whole upload, in seconds
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
}

fn default_deadline() -> u64 {
    1800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            backend: BackendSettings::default(),
            docker: DockerSettings::default(),
            retry: RetrySettings::default(),
            deadline_secs: default_deadline(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, UploadError> {
        let contents = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(|e| {
            UploadError::ConfigError(format!("Invalid settings file {}: {}", path.display(), e))
        })
    }

    /// Load settings from `path`, falling back to defaults when it does not exist
    pub async fn load_or_default(path: &Path) -> Result<Self, UploadError> {
        match tokio::fs::metadata(path).await {
            Ok(_) => Self::load(path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Control plane API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the control plane API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Bearer token for the control plane API
    #[serde(default, skip_serializing)]
    pub api_token: Option<SecretString>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Docker CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerSettings {
    /// Docker binary name or path
    #[serde(default = "default_docker_binary")]
    pub binary: String,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
        }
    }
}

/// Push backoff settings. The number of attempts is fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay between retries, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            cooldown: CooldownOptions {
                base_delay: Duration::from_millis(settings.base_delay_ms),
                max_delay: Duration::from_millis(settings.max_delay_ms),
                multiplier: 2.0,
            },
        }
    }
}
