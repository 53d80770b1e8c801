//! Configuration model: controller addressing, Pushover credentials, loop pacing,
//! and logging. Loaded from TOML, overridden by CLI flags, validated once at startup.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{PwdError, Result};

/// Default Pushover API root.
pub const DEFAULT_API_BASE: &str = "https://api.pushover.net/1";

/// Pushover refuses emergency retries shorter than this.
pub const MIN_RETRY_SECS: u32 = 30;

/// Pushover refuses emergency expiry windows longer than this (3 hours).
pub const MAX_EXPIRE_SECS: u32 = 10_800;

static DEVICE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,25}$").expect("device name pattern is valid")
});

/// Full runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub controller: ControllerConfig,
    pub pushover: PushoverConfig,
    pub watchdog: WatchdogConfig,
    pub logging: LoggingConfig,
}

/// Addressing of the supervised S7 CPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// IP address or host name of the PLC.
    pub ip: String,
    /// Rack number of the CPU (0..=7).
    pub rack: u16,
    /// Slot number of the CPU (0..=31).
    pub slot: u16,
    /// ISO-on-TCP port.
    pub port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ip: String::new(),
            rack: 0,
            slot: 2,
            port: 102,
        }
    }
}

impl ControllerConfig {
    /// Human-readable controller label used in alerts and logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} (rack {}, slot {})", self.ip, self.rack, self.slot)
    }
}

/// Pushover credentials and emergency-priority parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushoverConfig {
    /// Recipient user (or group) key.
    pub user_key: String,
    /// Application API token.
    pub app_token: String,
    /// Re-delivery interval for emergency alerts, seconds.
    pub retry_secs: u32,
    /// How long an emergency alert keeps re-delivering, seconds.
    pub expire_secs: u32,
    /// Restrict delivery to these device names. Empty = all devices.
    pub devices: Vec<String>,
    /// API root, overridable for testing.
    pub api_base: String,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            user_key: String::new(),
            app_token: String::new(),
            retry_secs: 60,
            expire_secs: 600,
            devices: Vec::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Loop pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    pub polling_interval_secs: u64,
    /// Pause between acknowledgment polls while an incident is raised.
    pub grace_interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: 10,
            grace_interval_secs: 5,
        }
    }
}

impl WatchdogConfig {
    #[must_use]
    pub const fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    #[must_use]
    pub const fn grace_interval(&self) -> Duration {
        Duration::from_secs(self.grace_interval_secs)
    }
}

/// Log destination and verbosity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Append log lines here instead of stderr.
    pub file: Option<PathBuf>,
    pub verbose: bool,
}

impl Config {
    /// Load a TOML configuration file. Missing sections and keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PwdError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| PwdError::io(path, source))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Check mandatory values and the limits the Pushover API enforces.
    pub fn validate(&self) -> Result<()> {
        if self.controller.ip.trim().is_empty() {
            return Err(PwdError::MissingArgument { name: "ip" });
        }
        if self.pushover.user_key.trim().is_empty() {
            return Err(PwdError::MissingArgument { name: "key" });
        }
        if self.pushover.app_token.trim().is_empty() {
            return Err(PwdError::MissingArgument { name: "token" });
        }
        if self.controller.rack > 7 {
            return invalid(format!("rack {} out of range 0..=7", self.controller.rack));
        }
        if self.controller.slot > 31 {
            return invalid(format!("slot {} out of range 0..=31", self.controller.slot));
        }
        if self.watchdog.polling_interval_secs == 0 {
            return invalid("polling interval must be at least 1 second");
        }
        if self.watchdog.grace_interval_secs == 0 {
            return invalid("grace interval must be at least 1 second");
        }
        if self.pushover.retry_secs < MIN_RETRY_SECS {
            return invalid(format!(
                "retry {}s below the Pushover minimum of {MIN_RETRY_SECS}s",
                self.pushover.retry_secs
            ));
        }
        if self.pushover.expire_secs > MAX_EXPIRE_SECS {
            return invalid(format!(
                "expire {}s above the Pushover maximum of {MAX_EXPIRE_SECS}s",
                self.pushover.expire_secs
            ));
        }
        if self.pushover.expire_secs < self.pushover.retry_secs {
            return invalid(format!(
                "expire {}s shorter than retry {}s",
                self.pushover.expire_secs, self.pushover.retry_secs
            ));
        }
        if let Some(bad) = self
            .pushover
            .devices
            .iter()
            .find(|device| !DEVICE_NAME.is_match(device))
        {
            return invalid(format!("invalid device name {bad:?}"));
        }
        Ok(())
    }

    /// Make relative paths absolute so they survive the `chdir("/")` of a daemon.
    pub fn resolve_paths(&mut self) -> Result<()> {
        if let Some(file) = self.logging.file.as_mut() {
            if file.is_relative() {
                let absolute = std::path::absolute(file.as_path())
                    .map_err(|source| PwdError::io(file.as_path(), source))?;
                *file = absolute;
            }
        }
        Ok(())
    }
}

fn invalid<T>(details: impl Into<String>) -> Result<T> {
    Err(PwdError::InvalidConfig {
        details: details.into(),
    })
}
