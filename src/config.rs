//! Configuration management for the throttle service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ThrottleError};
use crate::throttle::{
    KeyStrategy, ThrottleConfig, DEFAULT_IP_MAX_REQUESTS, DEFAULT_LIST_MAX_REQUESTS,
    DEFAULT_SWEEP_INTERVAL, DEFAULT_TENANT_MAX_REQUESTS, DEFAULT_WINDOW,
};

/// Prefix for environment overrides, e.g. `THROTTLE__SERVER__HTTP_ADDR`.
pub const ENV_PREFIX: &str = "THROTTLE";

/// Main configuration for the throttle service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThrottleServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Throttling configuration
    #[serde(default)]
    pub throttling: ThrottlingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlingConfig {
    /// Seconds between sweeps of expired entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Named throttle profiles
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            profiles: default_profiles(),
        }
    }
}

impl ThrottlingConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_profiles() -> BTreeMap<String, ProfileConfig> {
    BTreeMap::from([
        (
            "ip".to_string(),
            ProfileConfig {
                window_ms: default_window_ms(),
                max_requests: DEFAULT_IP_MAX_REQUESTS,
                key: KeyStrategy::Ip,
            },
        ),
        (
            "leads".to_string(),
            ProfileConfig {
                window_ms: default_window_ms(),
                max_requests: DEFAULT_LIST_MAX_REQUESTS,
                key: KeyStrategy::Ip,
            },
        ),
        (
            "tenant".to_string(),
            ProfileConfig {
                window_ms: default_window_ms(),
                max_requests: DEFAULT_TENANT_MAX_REQUESTS,
                key: KeyStrategy::Tenant,
            },
        ),
    ])
}

/// Limits and key derivation for one named throttle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests allowed per window
    pub max_requests: u64,

    /// How the throttle key is derived
    pub key: KeyStrategy,
}

impl ProfileConfig {
    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig::new(self.max_requests, Duration::from_millis(self.window_ms))
    }
}

fn default_window_ms() -> u64 {
    u64::try_from(DEFAULT_WINDOW.as_millis()).unwrap_or(u64::MAX)
}

impl ThrottleServiceConfig {
    /// Load configuration from an optional YAML file layered with
    /// `THROTTLE__*` environment variables.
    ///
    /// Both layers sit on top of the built-in defaults, so a single variable
    /// such as `THROTTLE__THROTTLING__PROFILES__IP__MAX_REQUESTS` adjusts one
    /// field of a default profile. Profiles from the file are merged with
    /// the defaults by name.
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            info!(path = %path, "Loading throttle configuration");
            builder = builder.add_source(config::File::new(path, config::FileFormat::Yaml));
        }

        let config: ThrottleServiceConfig = builder.add_source(env).build()?.try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file without environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ThrottleServiceConfig =
            serde_yaml::from_str(yaml).map_err(|e| ThrottleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the throttle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.throttling.sweep_interval_secs == 0 {
            return Err(ThrottleError::Config(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.throttling.profiles.is_empty() {
            return Err(ThrottleError::Config(
                "at least one throttle profile is required".to_string(),
            ));
        }

        for (name, profile) in &self.throttling.profiles {
            if profile.window_ms == 0 {
                return Err(ThrottleError::Config(format!(
                    "profile '{}': window_ms must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
