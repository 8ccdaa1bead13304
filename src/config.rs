use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::catalog::product::DEFAULT_CATEGORIES;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub store: StoreConfig,
  pub catalog: CatalogConfig,
  pub offline: OfflineConfig,
  pub ebook: EbookConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Local state store (defaults to <data_dir>/storefront/store.db)
  pub path: Option<PathBuf>,
  /// Response cache (defaults to <data_dir>/storefront/responses.db)
  pub responses_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
  /// How many products `load` asks for when none is given
  pub count: usize,
  pub categories: Vec<String>,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      count: 100,
      categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
  /// Origin the fallback resources are resolved against
  pub origin: String,
  /// Version tag appended to partition names
  pub version: String,
  /// Resources pre-cached on install
  pub precache: Vec<String>,
  /// Page served for failed navigations
  pub fallback_page: String,
  /// Hosts whose requests go to the fonts partition
  pub font_hosts: Vec<String>,
  pub timeout_secs: u64,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      origin: "http://localhost:5173".to_string(),
      version: "v5".to_string(),
      precache: vec!["/index.html".to_string(), "/favicon.ico".to_string()],
      fallback_page: "/index.html".to_string(),
      font_hosts: vec![
        "fonts.googleapis.com".to_string(),
        "fonts.gstatic.com".to_string(),
      ],
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EbookConfig {
  pub count: usize,
  /// Length of the worker's busy loop
  pub iterations: u64,
}

impl Default for EbookConfig {
  fn default() -> Self {
    Self {
      count: 500,
      iterations: 100_000_000,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
  /// Filter directive used when STOREFRONT_LOG is unset and no -v is given
  pub level: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./storefront.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/storefront/config.yaml
  ///
  /// Without any file every setting takes its default.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("storefront.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("storefront").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-default config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }

    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;

    if config.catalog.categories.is_empty() {
      return Err(eyre!("catalog.categories must not be empty"));
    }

    Ok(config)
  }
}
