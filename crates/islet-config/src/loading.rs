//! Layered configuration loading.
//!
//! Priority: environment variables > config file > defaults.

use std::path::Path;

use figment::{
    providers::{Env, Serialized},
    Figment,
};

use crate::config::IsletConfig;
use crate::discovery::{read_config_value, ConfigDiscovery};
use crate::error::{ConfigError, Result};

/// Prefix for environment overrides, e.g. `ISLET_BUILD__OUT_DIR=public`.
pub const ENV_PREFIX: &str = "ISLET_";

impl IsletConfig {
    /// Load configuration for the project at `root`.
    ///
    /// The discovered file is optional; without one the defaults apply. Nested
    /// keys in environment variables are separated by a double underscore.
    /// Relative paths are resolved against `root` and the named profile, if
    /// any, is applied last.
    pub fn load(root: impl AsRef<Path>, profile: Option<&str>) -> Result<Self> {
        let root = root.as_ref();
        // Section defaults come from serde, so tables such as `renderers` are
        // replaced by the file rather than merged into the built-in registry.
        let mut figment = Figment::new();

        if let Some(path) = ConfigDiscovery::new(root).find() {
            tracing::debug!(path = %path.display(), "loading islet config");
            figment = figment.merge(Serialized::defaults(read_config_value(&path)?));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: IsletConfig = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            hint: Some(e.to_string()),
        })?;

        config.materialize_profile(profile).map(|c| c.rooted_at(root))
    }
}
