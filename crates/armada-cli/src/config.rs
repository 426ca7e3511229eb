//! Configuration Vault – reads/writes `~/.armada/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use armada_kernel::LifecycleTimings;
use armada_runtime::{ManagerConfig, ReloadPolicy};

/// Readiness timings, in the units operators usually think in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingsConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
}

/// Persisted coordinator configuration stored in `~/.armada/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Namespace this coordinator owns robots under.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Directory searched recursively for `robot_description.yaml`.
    #[serde(default = "default_description_root")]
    pub description_root: String,

    /// WebSocket port peers connect to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Peer coordinators: namespace → `ws://host:port`.
    #[serde(default)]
    pub peers: BTreeMap<String, String>,

    /// Resource catalog file. Empty selects `~/.armada/<namespace>.catalog`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub catalog_path: String,

    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,

    #[serde(default)]
    pub timings: TimingsConfig,

    #[serde(default)]
    pub reload: ReloadConfig,
}

fn default_namespace() -> String {
    "armada".to_string()
}
fn default_description_root() -> String {
    ".".to_string()
}
fn default_listen_port() -> u16 {
    9310
}
fn default_forward_timeout_secs() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_readiness_timeout_secs() -> u64 {
    30
}
fn default_settle_delay_secs() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_max_attempts() -> u32 {
    3
}
fn default_per_minute() -> u32 {
    6
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            readiness_timeout_secs: default_readiness_timeout_secs(),
            settle_delay_secs: default_settle_delay_secs(),
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_attempts: default_max_attempts(),
            per_minute: default_per_minute(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            description_root: default_description_root(),
            listen_port: default_listen_port(),
            peers: BTreeMap::new(),
            catalog_path: String::new(),
            forward_timeout_secs: default_forward_timeout_secs(),
            timings: TimingsConfig::default(),
            reload: ReloadConfig::default(),
        }
    }
}

impl Config {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            timings: LifecycleTimings {
                poll_interval: Duration::from_millis(self.timings.poll_interval_ms.max(1)),
                readiness_timeout: Duration::from_secs(self.timings.readiness_timeout_secs),
                settle_delay: Duration::from_secs(self.timings.settle_delay_secs),
            },
            forward_timeout: self.forward_timeout(),
            reload: ReloadPolicy {
                enabled: self.reload.enabled,
                max_attempts: self.reload.max_attempts,
                per_minute: self.reload.per_minute,
            },
            ..ManagerConfig::new(self.namespace.clone())
        }
    }

    /// The catalog file, resolved against `home` when not set explicitly.
    pub fn catalog_file(&self, home: &str) -> PathBuf {
        if self.catalog_path.is_empty() {
            armada_dir(home).join(format!("{}.catalog", self.namespace))
        } else {
            PathBuf::from(&self.catalog_path)
        }
    }
}

pub fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn armada_dir(home: &str) -> PathBuf {
    PathBuf::from(home).join(".armada")
}

/// Return the path to `~/.armada/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    armada_dir(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ARMADA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARMADA_NAMESPACE` | `namespace` |
/// | `ARMADA_DESCRIPTION_ROOT` | `description_root` |
/// | `ARMADA_LISTEN_PORT` | `listen_port` |
/// | `ARMADA_PEERS` | `peers`, as `ns=ws://host:port,ns2=…` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARMADA_NAMESPACE")
        && !v.trim().is_empty()
    {
        cfg.namespace = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("ARMADA_DESCRIPTION_ROOT") {
        cfg.description_root = v;
    }
    if let Ok(v) = std::env::var("ARMADA_LISTEN_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.listen_port = port;
    }
    if let Ok(v) = std::env::var("ARMADA_PEERS") {
        cfg.peers = parse_peers(&v);
    }
}

/// Parse `ns=url` pairs separated by commas; malformed pairs are dropped.
pub fn parse_peers(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (ns, url) = pair.split_once('=')?;
            let (ns, url) = (ns.trim(), url.trim());
            (!ns.is_empty() && !url.is_empty()).then(|| (ns.to_string(), url.to_string()))
        })
        .collect()
}

/// Save the config to disk, creating `~/.armada/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
