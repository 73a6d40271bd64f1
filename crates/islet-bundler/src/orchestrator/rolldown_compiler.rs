//! Inner compiler backed by Rolldown.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rolldown::{
    BundlerBuilder as RolldownBundlerBuilder, BundlerOptions, InputItem, OutputFormat, Platform,
    ResolveOptions,
};
use tracing::{debug, trace};

use super::compiler::{
    client_chunk_name, ClientCompilationConfig, CompilationOutput, Compiler, CompilerFactory,
    CompilerId,
};
use crate::diagnostics::extract_warnings;
use crate::manifest::ManifestError;
use crate::plugins::{ClientEntryPlugin, ManifestPlugin, ManifestSlot, PluginRegistry};
use crate::{Error, Result};

/// Module resolution shared by the server and client builds.
///
/// `node_modules` is searched from `root` up to the filesystem root. Browser
/// builds prefer the `browser` field and condition.
pub(crate) fn resolve_options(root: &Path, platform: Platform) -> ResolveOptions {
    let mut modules: Vec<String> = root
        .ancestors()
        .map(|dir| dir.join("node_modules").to_string_lossy().to_string())
        .collect();
    modules.push("node_modules".to_string());

    let (main_fields, conditions) = match platform {
        Platform::Browser => (
            vec!["browser", "module", "main"],
            vec!["browser", "import", "module", "default"],
        ),
        _ => (
            vec!["module", "main"],
            vec!["node", "import", "module", "default"],
        ),
    };

    ResolveOptions {
        main_fields: Some(main_fields.into_iter().map(str::to_string).collect()),
        condition_names: Some(conditions.into_iter().map(str::to_string).collect()),
        extensions: Some(
            [".js", ".jsx", ".mjs", ".ts", ".tsx", ".json"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        ),
        modules: Some(modules),
        symlinks: Some(true),
        ..Default::default()
    }
}

/// Browser build of the client entries of one universal entry set.
///
/// Rolldown bundlers are single-use, so each `compile` assembles a fresh one
/// from the kept configuration.
#[derive(Debug)]
pub struct RolldownCompiler {
    id: CompilerId,
    config: ClientCompilationConfig,
    with_manifest: bool,
}

impl RolldownCompiler {
    pub fn new(config: ClientCompilationConfig, with_manifest: bool) -> Self {
        Self {
            id: CompilerId::next(),
            config,
            with_manifest,
        }
    }

    fn options(&self) -> BundlerOptions {
        let config = &self.config;
        BundlerOptions {
            input: Some(
                config
                    .entries
                    .iter()
                    .map(|entry| InputItem {
                        name: Some(client_chunk_name(&entry.id)),
                        import: entry.specifier.clone(),
                    })
                    .collect(),
            ),
            cwd: Some(config.root.clone()),
            platform: Some(Platform::Browser),
            format: Some(OutputFormat::Esm),
            minify: config.minify.then(|| rolldown::RawMinifyOptions::from(true)),
            resolve: Some(resolve_options(&config.root, Platform::Browser)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Compiler for RolldownCompiler {
    fn id(&self) -> CompilerId {
        self.id
    }

    async fn compile(&self) -> Result<CompilationOutput> {
        let slot: ManifestSlot = Arc::new(Mutex::new(None));

        let mut registry = PluginRegistry::new();
        registry.add(ClientEntryPlugin::new(
            Arc::clone(&self.config.modules),
            self.config.root.clone(),
        ));
        if self.with_manifest {
            registry.add(ManifestPlugin::new(Arc::clone(&slot)));
        }

        trace!(compiler = %self.id, plugins = registry.len(), "assembling client bundler");
        let mut bundler = RolldownBundlerBuilder::default()
            .with_options(self.options())
            .with_plugins(registry.into_rolldown_plugins())
            .build()
            .map_err(|e| Error::from_rolldown_batch(&e))?;

        let generated = bundler.generate().await;
        let manifest = slot.lock().take();

        let bundle = match generated {
            Ok(bundle) => bundle,
            // Prefer the typed manifest error over Rolldown's rendering of it.
            Err(e) => {
                return Err(match manifest {
                    Some(Err(err)) => Error::Manifest(err),
                    _ => Error::from_rolldown_batch(&e),
                });
            }
        };

        let manifest = match manifest {
            Some(Ok(manifest)) => Some(manifest),
            Some(Err(err)) => return Err(Error::Manifest(err)),
            None if self.with_manifest => return Err(Error::Manifest(ManifestError::Missing)),
            None => None,
        };

        let warnings = extract_warnings(&bundle.warnings);
        debug!(
            compiler = %self.id,
            outputs = bundle.assets.len(),
            warnings = warnings.len(),
            "client bundle generated"
        );

        Ok(CompilationOutput {
            assets: bundle.assets,
            manifest,
            warnings,
        })
    }
}

/// Creates [`RolldownCompiler`]s, with the chunk manifest plugin unless told
/// otherwise.
#[derive(Debug, Clone, Copy)]
pub struct RolldownCompilerFactory {
    with_manifest: bool,
}

impl RolldownCompilerFactory {
    pub fn new() -> Self {
        Self { with_manifest: true }
    }

    /// A factory whose compilers skip the manifest plugin. The orchestrator
    /// refuses it; useful for embedding the client build elsewhere.
    pub fn without_manifest_plugin() -> Self {
        Self {
            with_manifest: false,
        }
    }
}

impl Default for RolldownCompilerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerFactory for RolldownCompilerFactory {
    fn create(&self, config: ClientCompilationConfig) -> Result<Arc<dyn Compiler>> {
        if config.entries.is_empty() {
            return Err(Error::InvalidConfig(
                "client compilation needs at least one entry".to_string(),
            ));
        }
        Ok(Arc::new(RolldownCompiler::new(config, self.with_manifest)))
    }

    fn emits_manifest(&self) -> bool {
        self.with_manifest
    }
}
