//! Configuration system (layered: defaults > config file > environment).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::auth::device_code::DEFAULT_POLL_INTERVAL;
use crate::error::{LauncherError, Result};

const DEFAULT_TENANT: &str = "consumers";
const DEFAULT_SCOPE: &str = "XboxLive.signin offline_access openid profile";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Tunables for [`AuthCoordinator`](crate::auth::AuthCoordinator).
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Poll period when the challenge carries no interval.
    pub default_poll_interval: Duration,
    /// Lengthen the poll period when the token endpoint answers `slow_down`.
    ///
    /// Off by default: `slow_down` is treated like `authorization_pending`.
    pub honor_slow_down: bool,
    /// Added to the poll period on each honoured `slow_down`.
    pub slow_down_step: Duration,
    /// Upper bound on any single bridge call.
    pub bridge_timeout: Duration,
    pub initial_status: String,
    pub waiting_status: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_poll_interval: DEFAULT_POLL_INTERVAL,
            honor_slow_down: false,
            slow_down_step: Duration::from_secs(5),
            bridge_timeout: Duration::from_secs(30),
            initial_status: "Requesting device code...".to_string(),
            waiting_status: "Waiting for authorization...".to_string(),
        }
    }
}

/// Microsoft identity platform settings for the reference backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MicrosoftConfig {
    /// Azure application (client) id. Device login is unavailable without it.
    pub client_id: Option<String>,
    pub tenant: String,
    pub scope: String,
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            tenant: DEFAULT_TENANT.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

/// Top-level launcher login configuration.
///
/// Resolution order (later wins):
/// 1. Built-in defaults
/// 2. `config.toml` in [`LauncherConfig::default_dir`]
/// 3. `LAUNCHER_AUTH_*` environment variables (a `.env` file is honoured)
#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    pub coordinator: CoordinatorConfig,
    pub microsoft: MicrosoftConfig,
    /// Where the reference backend keeps the active account.
    pub data_dir: PathBuf,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            microsoft: MicrosoftConfig::default(),
            data_dir: Self::default_dir(),
        }
    }
}

impl LauncherConfig {
    /// Per-user launcher directory, falling back to `./.launcher-auth`.
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "launcher-auth")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".launcher-auth"))
    }

    /// Load every layer: defaults, the default config file if present, env.
    pub fn load() -> Result<Self> {
        let path = Self::default_dir().join(CONFIG_FILE_NAME);
        let config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_env())
    }

    /// Defaults overlaid with environment variables only.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Defaults overlaid with a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&raw)?;
        let mut config = Self::default();
        file.apply(&mut config)?;
        Ok(config)
    }

    /// Overlay `LAUNCHER_AUTH_*` variables from the process environment.
    pub fn with_env(mut self) -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        self.apply_env(|key| std::env::var(key).ok());
        self
    }

    /// Overlay variables resolved through `lookup`.
    ///
    /// Unparseable values are logged and skipped.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let secs_mappings: [(&str, &mut Duration); 3] = [
            (
                "LAUNCHER_AUTH_POLL_INTERVAL_SECS",
                &mut self.coordinator.default_poll_interval,
            ),
            (
                "LAUNCHER_AUTH_SLOW_DOWN_STEP_SECS",
                &mut self.coordinator.slow_down_step,
            ),
            (
                "LAUNCHER_AUTH_BRIDGE_TIMEOUT_SECS",
                &mut self.coordinator.bridge_timeout,
            ),
        ];
        for (env_var, slot) in secs_mappings {
            if let Some(raw) = lookup(env_var) {
                match parse_secs(&raw) {
                    Some(value) => *slot = value,
                    None => tracing::warn!(env_var, value = %raw, "Ignoring invalid duration"),
                }
            }
        }

        if let Some(raw) = lookup("LAUNCHER_AUTH_HONOR_SLOW_DOWN") {
            match parse_bool(&raw) {
                Some(value) => self.coordinator.honor_slow_down = value,
                None => tracing::warn!(
                    env_var = "LAUNCHER_AUTH_HONOR_SLOW_DOWN",
                    value = %raw,
                    "Ignoring invalid flag"
                ),
            }
        }

        if let Some(client_id) = lookup("LAUNCHER_AUTH_CLIENT_ID") {
            self.microsoft.client_id = Some(client_id);
        }
        if let Some(tenant) = lookup("LAUNCHER_AUTH_TENANT") {
            self.microsoft.tenant = tenant;
        }
        if let Some(dir) = lookup("LAUNCHER_AUTH_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    coordinator: CoordinatorSection,
    microsoft: MicrosoftSection,
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CoordinatorSection {
    poll_interval_secs: Option<u64>,
    honor_slow_down: Option<bool>,
    slow_down_step_secs: Option<u64>,
    bridge_timeout_secs: Option<u64>,
    initial_status: Option<String>,
    waiting_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MicrosoftSection {
    client_id: Option<String>,
    tenant: Option<String>,
    scope: Option<String>,
}

impl ConfigFile {
    fn apply(self, config: &mut LauncherConfig) -> Result<()> {
        let section = self.coordinator;
        if let Some(secs) = section.poll_interval_secs {
            if secs == 0 {
                return Err(LauncherError::Configuration(
                    "coordinator.poll_interval_secs must be greater than zero".to_string(),
                ));
            }
            config.coordinator.default_poll_interval = Duration::from_secs(secs);
        }
        if let Some(flag) = section.honor_slow_down {
            config.coordinator.honor_slow_down = flag;
        }
        if let Some(secs) = section.slow_down_step_secs {
            config.coordinator.slow_down_step = Duration::from_secs(secs);
        }
        if let Some(secs) = section.bridge_timeout_secs {
            config.coordinator.bridge_timeout = Duration::from_secs(secs);
        }
        if let Some(status) = section.initial_status {
            config.coordinator.initial_status = status;
        }
        if let Some(status) = section.waiting_status {
            config.coordinator.waiting_status = status;
        }

        let section = self.microsoft;
        if section.client_id.is_some() {
            config.microsoft.client_id = section.client_id;
        }
        if let Some(tenant) = section.tenant {
            config.microsoft.tenant = tenant;
        }
        if let Some(scope) = section.scope {
            config.microsoft.scope = scope;
        }

        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        Ok(())
    }
}

fn parse_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_device_grant_conventions() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.default_poll_interval, Duration::from_secs(5));
        assert!(!config.honor_slow_down);
        assert_eq!(config.slow_down_step, Duration::from_secs(5));
        assert_eq!(config.waiting_status, "Waiting for authorization...");
    }

    #[test]
    fn env_overrides_durations_and_flags() {
        let mut config = LauncherConfig::default();
        config.apply_env(lookup_from(&[
            ("LAUNCHER_AUTH_POLL_INTERVAL_SECS", "9"),
            ("LAUNCHER_AUTH_HONOR_SLOW_DOWN", "yes"),
            ("LAUNCHER_AUTH_CLIENT_ID", "client-abc"),
            ("LAUNCHER_AUTH_DATA_DIR", "/tmp/launcher"),
        ]));

        assert_eq!(
            config.coordinator.default_poll_interval,
            Duration::from_secs(9)
        );
        assert!(config.coordinator.honor_slow_down);
        assert_eq!(config.microsoft.client_id.as_deref(), Some("client-abc"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/launcher"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut config = LauncherConfig::default();
        config.apply_env(lookup_from(&[
            ("LAUNCHER_AUTH_POLL_INTERVAL_SECS", "soon"),
            ("LAUNCHER_AUTH_BRIDGE_TIMEOUT_SECS", "0"),
            ("LAUNCHER_AUTH_HONOR_SLOW_DOWN", "maybe"),
        ]));

        assert_eq!(config.coordinator, CoordinatorConfig::default());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
