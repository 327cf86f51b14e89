//! Load config from file and environment.

use std::path::{Path, PathBuf};

use hike_core::{Address, InboxPolicy, PeerEntry};
use serde::Deserialize;

/// Daemon configuration. File: ~/.config/hikeboard/config.toml or /etc/hikeboard/config.toml.
/// Env overrides: HIKE_ADDRESS, HIKE_PORT, HIKE_BROADCAST_SECS, HIKE_DATA_DIR.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// This device's address. Random locally administered address when unset.
    #[serde(default)]
    pub address: Option<Address>,
    /// Multicast UDP port shared by all devices (default 45699).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between broadcasts (default 5).
    #[serde(default = "default_broadcast_interval_secs")]
    pub broadcast_interval_secs: u64,
    /// Directory holding the persisted blobs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub inbox_policy: InboxPolicy,
    /// Log filter used when RUST_LOG is unset (default "info").
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Peers added on first boot, before any pairing.
    #[serde(default)]
    pub bootstrap_peers: Vec<PeerEntry>,
}

fn default_port() -> u16 {
    45699
}
fn default_broadcast_interval_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(h) => PathBuf::from(h).join(".local/share/hikeboard"),
        None => PathBuf::from("/var/lib/hikeboard"),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            broadcast_interval_secs: default_broadcast_interval_secs(),
            data_dir: default_data_dir(),
            inbox_policy: InboxPolicy::default(),
            log_level: default_log_level(),
            bootstrap_peers: Vec::new(),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |k| std::env::var(k).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("HIKE_ADDRESS") {
        if let Ok(a) = s.parse::<Address>() {
            c.address = Some(a);
        }
    }
    if let Some(s) = var("HIKE_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.port = p;
        }
    }
    if let Some(s) = var("HIKE_BROADCAST_SECS") {
        if let Ok(n) = s.parse::<u64>() {
            if n > 0 {
                c.broadcast_interval_secs = n;
            }
        }
    }
    if let Some(s) = var("HIKE_DATA_DIR") {
        c.data_dir = PathBuf::from(s);
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/hikeboard/config.toml"));
    }
    out.push(PathBuf::from("/etc/hikeboard/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            return parse_file(&p);
        }
    }
    None
}

fn parse_file(path: &Path) -> Option<Config> {
    let s = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<Config>(&s) {
        Ok(c) => Some(c),
        Err(e) => {
            // Logging is not up yet; the filter itself comes from this file.
            eprintln!("ignoring {}: {}", path.display(), e);
            None
        }
    }
}
