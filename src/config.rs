use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SERVICE_URL: &str = "https://restaurant-reviews-server.herokuapp.com";

/// Shell assets cached on install.
const DEFAULT_MANIFEST: &[&str] = &[
  "/",
  "/restaurant.html",
  "/manifest.json",
  "/css/styles.css",
  "/css/bootstrap-reboot.css",
  "/js/dbhelper.js",
  "/js/main.js",
  "/js/idb.js",
  "/js/register_sw.js",
  "/js/restaurant_info.js",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub service: ServiceConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub assets: AssetsConfig,
  #[serde(default)]
  pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Base URL of the restaurant data service
  #[serde(default = "default_service_url")]
  pub base_url: String,
  /// Upper bound for a single request
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      base_url: default_service_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ServiceConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Directory for the record store, pending reviews and asset cache
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
  /// Origin the application shell is served from
  #[serde(default = "default_origin")]
  pub origin: String,
  #[serde(default = "default_cache_prefix")]
  pub cache_prefix: String,
  /// Bump on every release that changes the manifest
  #[serde(default = "default_cache_version")]
  pub cache_version: String,
  #[serde(default = "default_manifest")]
  pub manifest: Vec<String>,
}

impl Default for AssetsConfig {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      cache_prefix: default_cache_prefix(),
      cache_version: default_cache_version(),
      manifest: default_manifest(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
  #[serde(default = "default_probe_interval_secs")]
  pub probe_interval_secs: u64,
}

impl Default for ConnectivityConfig {
  fn default() -> Self {
    Self {
      probe_interval_secs: default_probe_interval_secs(),
    }
  }
}

impl ConnectivityConfig {
  pub fn probe_interval(&self) -> Duration {
    Duration::from_secs(self.probe_interval_secs.max(1))
  }
}

fn default_service_url() -> String {
  DEFAULT_SERVICE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_origin() -> String {
  "http://localhost:8000".to_string()
}

fn default_cache_prefix() -> String {
  "restaurants-".to_string()
}

fn default_cache_version() -> String {
  "003".to_string()
}

fn default_manifest() -> Vec<String> {
  DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect()
}

fn default_probe_interval_secs() -> u64 {
  5
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dineline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dineline/config.yaml
  ///
  /// Without a config file the built-in defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var("DINELINE_SERVICE_URL") {
      config.service.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("dineline.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dineline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Directory holding all local state.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.storage.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("dineline"))
  }
}
