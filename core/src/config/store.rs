//! Configuration Store
//!
//! Loads and saves the TOML config file that holds the backend endpoint,
//! device identity, managed app ids, loop timings and platform bindings.

use crate::error::{OptionExt, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Unified kioskd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote state store endpoint
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Site and device identifiers
    #[serde(default)]
    pub device: DeviceConfig,

    /// The two managed applications
    #[serde(default)]
    pub apps: AppsConfig,

    /// Loop cadence and batch sizes
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// How each app id is started on this host (app_id -> entry)
    #[serde(default)]
    pub launchers: BTreeMap<String, LauncherEntry>,

    /// Lockdown hook commands
    #[serde(default)]
    pub lockdown: LockdownHooks,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the given path, or from the default location, or fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Get default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kioskd").join("config.toml"))
    }

    /// Build the immutable orchestrator config, failing on the first blank field
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig> {
        let base_url = required(&self.remote.base_url, "remote.base_url")?
            .trim_end_matches('/')
            .to_string();
        Ok(OrchestratorConfig {
            base_url,
            api_key: required(&self.remote.api_key, "remote.api_key")?,
            site_id: required(&self.device.site_id, "device.site_id")?,
            device_id: required(&self.device.device_id, "device.device_id")?,
            primary_app: required(&self.apps.primary, "apps.primary")?,
            kiosk_app: required(&self.apps.kiosk, "apps.kiosk")?,
        })
    }
}

fn required(value: &str, key: &str) -> Result<String> {
    let trimmed = value.trim();
    Some(trimmed)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_missing(key)
}

/// The six values the loop cannot run without
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub site_id: String,
    pub device_id: String,
    /// App A, cold-started first
    pub primary_app: String,
    /// App B, kept in the foreground and locked when kiosk mode is on
    pub kiosk_app: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn default_request_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub site_id: String,

    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppsConfig {
    #[serde(default)]
    pub primary: String,

    #[serde(default)]
    pub kiosk: String,

    /// Our own app id, always allowed next to the kiosk app
    #[serde(default = "default_self_id")]
    pub self_id: String,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            primary: String::new(),
            kiosk: String::new(),
            self_id: default_self_id(),
        }
    }
}

fn default_self_id() -> String {
    "kioskd".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Delay between cycles while idle or running without kiosk lock
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Delay between cycles while kiosk lock is enforced
    #[serde(default = "default_kiosk_interval")]
    pub kiosk_interval_ms: u64,

    /// Wait between launching the primary app and the kiosk app
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Max pending commands fetched per drain
    #[serde(default = "default_command_batch")]
    pub command_batch: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            kiosk_interval_ms: default_kiosk_interval(),
            settle_delay_ms: default_settle_delay(),
            command_batch: default_command_batch(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5_000
}

fn default_kiosk_interval() -> u64 {
    2_000
}

fn default_settle_delay() -> u64 {
    5_000
}

fn default_command_batch() -> usize {
    20
}

/// How to start one app on this host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LauncherEntry {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Command that raises an already running instance to the foreground
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

/// Commands run for each lockdown sub-step. `{apps}` expands to the allowed app ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LockdownHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict_tasks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_tasks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_status_bar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_status_bar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_keyguard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_keyguard: Option<String>,
}

impl LockdownHooks {
    /// Task restriction is the one step lockdown cannot do without
    pub fn is_capable(&self) -> bool {
        self.restrict_tasks.is_some() && self.release_tasks.is_some()
    }
}

/// Returns the data directory used for local state and daemon files
pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("kioskd"))
        .ok_or_invalid_path("<data_dir>/kioskd")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KioskError;
    use tempfile::TempDir;

    fn complete() -> Config {
        let mut config = Config::default();
        config.remote.base_url = "https://project.supabase.co/".to_string();
        config.remote.api_key = "anon".to_string();
        config.device.site_id = "unit-01".to_string();
        config.device.device_id = "dev-abc".to_string();
        config.apps.primary = "servidor".to_string();
        config.apps.kiosk = "gelafit-go".to_string();
        config
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.schedule.poll_interval_ms, 5_000);
        assert_eq!(config.schedule.kiosk_interval_ms, 2_000);
        assert_eq!(config.schedule.settle_delay_ms, 5_000);
        assert_eq!(config.schedule.command_batch, 20);
        assert_eq!(config.remote.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.apps.self_id, "kioskd");
        assert!(!config.lockdown.is_capable());
    }

    #[test]
    fn test_orchestrator_config_complete() {
        let orch = complete().orchestrator_config().unwrap();
        assert_eq!(orch.base_url, "https://project.supabase.co");
        assert_eq!(orch.primary_app, "servidor");
        assert_eq!(orch.kiosk_app, "gelafit-go");
    }

    #[test]
    fn test_orchestrator_config_blank_device_id() {
        let mut config = complete();
        config.device.device_id = "   ".to_string();
        match config.orchestrator_config() {
            Err(KioskError::MissingConfig { key }) => assert_eq!(key, "device.device_id"),
            other => panic!("expected MissingConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = complete();
        config.launchers.insert(
            "servidor".to_string(),
            LauncherEntry {
                program: "/opt/servidor/bin/servidor".to_string(),
                args: vec!["--port".to_string(), "8080".to_string()],
                cwd: None,
                env: BTreeMap::new(),
                focus: Some("wmctrl -a Servidor".to_string()),
            },
        );
        config.lockdown.restrict_tasks = Some("kioskctl allow {apps}".to_string());
        config.lockdown.release_tasks = Some("kioskctl allow --none".to_string());
        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded.device.device_id, "dev-abc");
        assert_eq!(loaded.launchers["servidor"].args.len(), 2);
        assert!(loaded.lockdown.is_capable());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [remote]
            base_url = "https://x.supabase.co"

            [schedule]
            poll_interval_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(parsed.schedule.poll_interval_ms, 100);
        assert_eq!(parsed.schedule.kiosk_interval_ms, 2_000);
        assert_eq!(parsed.remote.request_timeout_secs, 5);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.toml");
        let config = Config::load_or_default(Some(&missing)).unwrap();
        assert!(config.remote.base_url.is_empty());
    }
}
