//! High-level configuration structure for islet.
//!
//! This module provides the main `IsletConfig` struct and profile merging logic.
//! For file discovery, see the `discovery` module; for layered loading with
//! environment overrides, see `loading`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result as ConfigResult};
use crate::sections::{BuildSection, RenderSection, UniversalSection};
use crate::settings::GlobalSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsletConfig {
    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub universal: UniversalSection,

    #[serde(default)]
    pub render: RenderSection,

    #[serde(default)]
    pub settings: GlobalSettings,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub build: Value,

    #[serde(default)]
    pub universal: Value,

    #[serde(default)]
    pub render: Value,

    #[serde(default)]
    pub settings: Value,
}

impl IsletConfig {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use islet_config::IsletConfig;
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let value = json!({
    ///     "build": {
    ///         "source_dir": "pages",
    ///         "public_path": "/static/"
    ///     }
    /// });
    ///
    /// let config = IsletConfig::from_value(value).unwrap();
    /// assert_eq!(config.build.source_dir, PathBuf::from("pages"));
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Resolve relative paths in the config against a project root.
    pub fn rooted_at(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let absolutize = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };
        absolutize(&mut self.build.source_dir);
        absolutize(&mut self.build.out_dir);
        if let Some(wrapper) = self.universal.server_wrapper.as_mut() {
            absolutize(wrapper);
        }
        if let Some(wrapper) = self.universal.client_wrapper.as_mut() {
            absolutize(wrapper);
        }
        self
    }

    pub fn materialize_profile(mut self, profile: Option<&str>) -> ConfigResult<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };
        let Some(profile_cfg) = self.profiles.get(name).cloned() else {
            return Ok(self);
        };

        self.build = apply_override(&self.build, &profile_cfg.build)?;
        self.universal = apply_override(&self.universal, &profile_cfg.universal)?;
        self.render = apply_override(&self.render, &profile_cfg.render)?;
        self.settings = apply_override(&self.settings, &profile_cfg.settings)?;

        Ok(self)
    }
}

fn apply_override<T>(base: &T, update: &Value) -> ConfigResult<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Clone,
{
    if update.is_null() {
        return Ok(base.clone());
    }

    let mut merged =
        serde_json::to_value(base).map_err(|err| ConfigError::InvalidProfileOverride {
            message: err.to_string(),
        })?;
    merge_values(&mut merged, update);
    serde_json::from_value(merged).map_err(|err| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    })
}

fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, Value::Object(update_map)) => {
            let mut new_obj = serde_json::Map::with_capacity(update_map.len());
            for (key, value) in update_map {
                new_obj.insert(key.clone(), value.clone());
            }
            *target_slot = Value::Object(new_obj);
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::RenderMode;
    use serde_json::json;

    #[test]
    fn from_value_creates_config() {
        let value = json!({
            "build": {
                "out_dir": "public",
                "renderers": { "html": "./render-html.js", "txt": "./render-txt.js" }
            }
        });

        let config = IsletConfig::from_value(value).unwrap();
        assert_eq!(config.build.out_dir, PathBuf::from("public"));
        assert_eq!(
            config.build.renderers.keys().collect::<Vec<_>>(),
            vec!["html", "txt"]
        );
    }

    #[test]
    fn to_value_serializes_config() {
        let mut config = IsletConfig::default();
        config.build.minify = true;

        let value = config.to_value().unwrap();
        assert_eq!(value["build"]["minify"], json!(true));
    }

    #[test]
    fn profile_merging_works() {
        let value = json!({
            "build": { "minify": false },
            "render": { "mode": "isolated" },
            "profiles": {
                "production": {
                    "build": { "minify": true },
                    "render": { "mode": "batched", "abort_on_first_error": true }
                }
            }
        });

        let config = IsletConfig::from_value(value)
            .unwrap()
            .materialize_profile(Some("production"))
            .unwrap();

        assert!(config.build.minify);
        assert_eq!(config.render.mode, RenderMode::Batched);
        assert!(config.render.abort_on_first_error);
    }

    #[test]
    fn unknown_profile_is_a_no_op() {
        let config = IsletConfig::default()
            .materialize_profile(Some("staging"))
            .unwrap();
        assert_eq!(config.build.public_path, "/");
    }

    #[test]
    fn rooted_at_absolutizes_relative_paths() {
        let mut config = IsletConfig::default();
        config.universal.server_wrapper = Some(PathBuf::from("src/Providers.server.js"));
        let config = config.rooted_at("/project");

        assert_eq!(config.build.source_dir, PathBuf::from("/project/src"));
        assert_eq!(config.build.out_dir, PathBuf::from("/project/dist"));
        assert_eq!(
            config.universal.server_wrapper,
            Some(PathBuf::from("/project/src/Providers.server.js"))
        );
    }
}
