use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Base URL of the inventory service when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "https://inventorybackend-r4jz.onrender.com/api";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub service: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// API base, including the `/api` prefix.
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout. Timeouts surface as network errors.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Optional age in seconds after which cached query results revalidate
  /// on the next observation. Unset means entries only go stale when a
  /// mutation invalidates them.
  #[serde(default)]
  pub stale_secs: Option<i64>,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    ServiceConfig {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
      stale_secs: None,
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./stockroom.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/stockroom/config.yaml
  ///
  /// With no file anywhere the defaults apply; the service base URL is a
  /// known constant. `STOCKROOM_URL` overrides the base URL either way.
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
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("STOCKROOM_URL") {
      config.service.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("stockroom.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("stockroom").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_fill_missing_fields() {
    let config: Config = serde_yaml::from_str("service:\n  timeout_secs: 5\n").unwrap();
    assert_eq!(config.service.timeout_secs, 5);
    assert_eq!(config.service.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.service.stale_secs, None);
  }

  #[test]
  fn empty_document_is_all_defaults() {
    let config: Config = serde_yaml::from_str("{}").unwrap();
    assert_eq!(config.service.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.service.timeout_secs, 30);
  }

  #[test]
  fn stale_secs_parses_when_present() {
    let config: Config =
      serde_yaml::from_str("service:\n  base_url: http://localhost:4000/api\n  stale_secs: 120\n")
        .unwrap();
    assert_eq!(config.service.base_url, "http://localhost:4000/api");
    assert_eq!(config.service.stale_secs, Some(120));
  }
}
