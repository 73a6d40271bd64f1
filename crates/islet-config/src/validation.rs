//! Pluggable config validation strategies
//!
//! Separates filesystem validation from schema validation.

use std::path::Path;

use crate::config::IsletConfig;
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, config: &IsletConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use islet_config::{IsletConfig, SchemaValidator, ConfigValidator};
///
/// SchemaValidator.validate(&IsletConfig::default()).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &IsletConfig) -> Result<()> {
        if config.build.renderers.is_empty() {
            return Err(ConfigError::NoRenderers);
        }

        for (name, module) in &config.build.renderers {
            // The type becomes a filename infix (`page.<type>.js`) and an output extension.
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("renderer type `{name}` must be non-empty and alphanumeric"),
                    hint: Some("Use a plain extension such as `html` or `xml`".to_string()),
                });
            }
            if module.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("renderer module for `{name}` cannot be empty"),
                    hint: None,
                });
            }
        }

        let universal = &config.universal;
        for (field, value) in [
            ("universal.runtime_module", &universal.runtime_module),
            ("universal.client_renderer_module", &universal.client_renderer_module),
            ("universal.hydrate_function", &universal.hydrate_function),
            ("universal.server_renderer_module", &universal.server_renderer_module),
            ("universal.render_function", &universal.render_function),
            ("universal.element_module", &universal.element_module),
            ("universal.manifest_filename", &universal.manifest_filename),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("{field} cannot be empty"),
                    hint: None,
                });
            }
        }

        if universal.server_wrapper.is_some() != universal.client_wrapper.is_some() {
            return Err(ConfigError::SchemaValidation {
                message: "server_wrapper and client_wrapper must be set together".to_string(),
                hint: Some(
                    "Provide both context wrappers, or neither, so server and client trees match"
                        .to_string(),
                ),
            });
        }

        if config.render.timeout_ms == Some(0) {
            return Err(ConfigError::SchemaValidation {
                message: "render.timeout_ms must be greater than zero".to_string(),
                hint: Some("Remove the key to disable the timeout".to_string()),
            });
        }

        Ok(())
    }
}

/// Filesystem validator
///
/// Checks that the source directory and context wrappers exist under `root`.
pub struct FsValidator {
    root: std::path::PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &IsletConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let source_dir = self.root.join(&config.build.source_dir);
        if !source_dir.is_dir() {
            return Err(ConfigError::SourceDirNotFound { path: source_dir });
        }

        for wrapper in [&config.universal.server_wrapper, &config.universal.client_wrapper]
            .into_iter()
            .flatten()
        {
            let path = self.root.join(wrapper);
            if !path.exists() {
                return Err(ConfigError::WrapperNotFound { path });
            }
        }

        Ok(())
    }
}

pub fn validate_schema(config: &IsletConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

pub fn validate_fs(config: &IsletConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
