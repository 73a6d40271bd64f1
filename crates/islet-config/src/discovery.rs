//! File-based config discovery
//!
//! Finds the islet configuration file for a project root.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::IsletConfig;
use crate::error::{ConfigError, Result};

/// Name of the dedicated configuration file.
pub const CONFIG_FILE: &str = "islet.toml";

/// Key holding islet configuration inside `package.json`.
pub const PACKAGE_JSON_KEY: &str = "islet";

/// File-based configuration discovery
///
/// # Example
///
/// ```no_run
/// use islet_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. `islet.toml`
    /// 2. `package.json` with a non-null `islet` field
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed = serde_json::from_str::<Value>(&content).ok()?;
        match parsed.get(PACKAGE_JSON_KEY) {
            Some(value) if !value.is_null() => Some(pkg_path),
            _ => None,
        }
    }

    /// Load config from the discovered file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<IsletConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        IsletConfig::from_value(read_config_value(&path)?)
    }

    pub fn load_with_profile(&self, profile: &str) -> Result<IsletConfig> {
        self.load()?.materialize_profile(Some(profile))
    }
}

/// Read a config file (`islet.toml` or `package.json`) into a JSON value.
pub(crate) fn read_config_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;

    if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "package.json".to_string(),
                hint: Some(format!("Invalid JSON: {e}")),
            })?;

        return match parsed.get(PACKAGE_JSON_KEY) {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Err(ConfigError::InvalidValue {
                field: PACKAGE_JSON_KEY.to_string(),
                hint: Some("Add an 'islet' field to your package.json".to_string()),
            }),
        };
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => {
            let toml_val: toml::Value =
                toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                    field: "toml".to_string(),
                    hint: Some(format!("Invalid TOML syntax: {e}")),
                })?;
            serde_json::to_value(toml_val).map_err(|e| ConfigError::InvalidValue {
                field: "toml".to_string(),
                hint: Some(format!("TOML to JSON conversion failed: {e}")),
            })
        }
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

/// Discover and load config from the current directory.
pub fn discover() -> Result<IsletConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}

/// Discover and load config from the current directory with a profile applied.
pub fn discover_with_profile(profile: &str) -> Result<IsletConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load_with_profile(profile)
}
