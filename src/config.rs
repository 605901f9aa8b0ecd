use crate::app_dirs::AppDirs;
use crate::curriculum::LevelBuckets;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_plan_endpoint() -> String {
    "http://localhost:8787/api/plan".to_string()
}

fn default_practice_endpoint() -> String {
    "http://localhost:8787/api/practice".to_string()
}

fn default_rate_limit_window_secs() -> u64 {
    900
}

fn default_rate_limit_max_requests() -> u32 {
    50
}

fn default_client_id() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_plan_endpoint")]
    pub plan_endpoint: String,
    #[serde(default = "default_practice_endpoint")]
    pub practice_endpoint: String,
    /// Send error statistics to the practice endpoint instead of using
    /// the embedded templates.
    #[serde(default)]
    pub remote_practice: bool,
    #[serde(default)]
    pub level_buckets: LevelBuckets,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plan_endpoint: default_plan_endpoint(),
            practice_endpoint: default_practice_endpoint(),
            remote_practice: false,
            level_buckets: LevelBuckets::default(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            client_id: default_client_id(),
        }
    }
}

impl Config {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("keydrill_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
