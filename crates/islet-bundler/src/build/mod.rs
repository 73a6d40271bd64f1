//! Build sessions.
//!
//! [`IsletBuild`] ties the pipeline together: entry discovery, the server
//! build with the universal plugin, the nested client compilation, the chunk
//! manifest and static rendering.

mod watch;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use islet_config::IsletConfig;
use rolldown::{
    BundlerBuilder as RolldownBundlerBuilder, BundlerOptions, InputItem, OutputFormat, Platform,
};
use rolldown_common::Output;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use watch::WatchSession;

use crate::codegen::CodegenOptions;
use crate::diagnostics::{extract_warnings, ExtractedDiagnostic};
use crate::entries::{find_entries, patterns_for, Entry};
use crate::manifest::ChunkManifest;
use crate::orchestrator::{
    output_filename, BuildContext, ChildCompilationRecord, CompilerFactory, Orchestrator,
    RolldownCompilerFactory,
};
use crate::plugins::{PluginRegistry, UniversalPlugin};
use crate::render::{RenderJob, RenderedPage, TemplateRenderer};
use crate::{Error, Result};

/// Prefix of the server chunk of every entry.
const SERVER_CHUNK_PREFIX: &str = "server/";

/// Everything one build produced.
#[derive(Debug)]
pub struct BuildResult {
    /// Server chunks, client chunks and the manifest artifact.
    pub assets: Vec<Output>,
    pub manifest: ChunkManifest,
    pub entries: IndexMap<String, Entry>,
    /// Statistics of the client compilation; `None` without universal
    /// components.
    pub child: Option<ChildCompilationRecord>,
    pub warnings: Vec<ExtractedDiagnostic>,
    pub rendered: Vec<RenderedPage>,
    /// Templates that failed to render.
    pub render_failures: Vec<Error>,
}

impl BuildResult {
    fn empty() -> Self {
        Self {
            assets: Vec::new(),
            manifest: ChunkManifest::default(),
            entries: IndexMap::new(),
            child: None,
            warnings: Vec::new(),
            rendered: Vec::new(),
            render_failures: Vec::new(),
        }
    }

    /// Output filename of the compiled server module of entry `name`.
    pub fn server_module(&self, name: &str) -> Option<&str> {
        let chunk_name = format!("{SERVER_CHUNK_PREFIX}{name}");
        self.assets.iter().find_map(|output| match output {
            Output::Chunk(chunk) if chunk.is_entry && chunk.name.as_str() == chunk_name => {
                Some(chunk.filename.as_str())
            }
            _ => None,
        })
    }

    /// Output filenames in emission order.
    pub fn filenames(&self) -> Vec<&str> {
        self.assets.iter().map(output_filename).collect()
    }

    /// Write every output below `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        writer::write_outputs(&self.assets, dir)
    }

    /// Summary suitable for logging or a JSON report.
    pub fn summary(&self) -> BuildSummary<'_> {
        BuildSummary {
            outputs: self.assets.len(),
            entries: self.entries.keys().map(String::as_str).collect(),
            chunks: self.manifest.len(),
            child: self.child.as_ref(),
            rendered: &self.rendered,
            render_failures: self.render_failures.len(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary<'a> {
    pub outputs: usize,
    pub entries: Vec<&'a str>,
    pub chunks: usize,
    pub child: Option<&'a ChildCompilationRecord>,
    pub rendered: &'a [RenderedPage],
    pub render_failures: usize,
}

/// A configured project build.
#[derive(Debug, Clone)]
pub struct IsletBuild {
    root: PathBuf,
    config: IsletConfig,
    factory: Arc<dyn CompilerFactory>,
}

impl IsletBuild {
    /// Relative paths in `config` are resolved against `root`.
    pub fn new(root: impl Into<PathBuf>, config: IsletConfig) -> Self {
        let root = root.into();
        Self {
            config: config.rooted_at(&root),
            root,
            factory: Arc::new(RolldownCompilerFactory::default()),
        }
    }

    /// Load and validate the configuration of the project at `root`.
    pub fn discover(root: impl AsRef<Path>, profile: Option<&str>) -> Result<Self> {
        let root = root.as_ref();
        let config = IsletConfig::load(root, profile)?;
        islet_config::validate_schema(&config)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            factory: Arc::new(RolldownCompilerFactory::default()),
        })
    }

    /// Use another inner compiler factory.
    pub fn with_factory(mut self, factory: Arc<dyn CompilerFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &IsletConfig {
        &self.config
    }

    pub(crate) fn orchestrator(&self) -> Result<Arc<Orchestrator>> {
        Ok(Arc::new(Orchestrator::new(Arc::clone(&self.factory))?))
    }

    /// Compile the project without writing or rendering anything.
    pub async fn build(&self) -> Result<BuildResult> {
        let orchestrator = self.orchestrator()?;
        self.build_with(orchestrator).await
    }

    /// Build, write the outputs to the configured directory and render the
    /// templates.
    pub async fn run(&self) -> Result<BuildResult> {
        let mut result = self.build().await?;
        self.finish(&mut result).await?;
        Ok(result)
    }

    pub(crate) async fn finish(&self, result: &mut BuildResult) -> Result<()> {
        result.write_to(&self.config.build.out_dir)?;
        self.render(result).await
    }

    pub(crate) async fn build_with(&self, orchestrator: Arc<Orchestrator>) -> Result<BuildResult> {
        let build = &self.config.build;
        let patterns = patterns_for(&build.renderers)?;
        let entries = find_entries(&build.source_dir, &patterns)?;
        if entries.is_empty() {
            warn!(dir = %build.source_dir.display(), "no templates found");
            return Ok(BuildResult::empty());
        }

        let codegen = CodegenOptions::from_config(&self.config.universal, &self.root);
        let ctx = Arc::new(BuildContext::new(&self.root, codegen).with_minify(build.minify));

        let mut registry = PluginRegistry::new();
        registry.add(UniversalPlugin::new(
            Arc::clone(&ctx),
            orchestrator,
            self.config.universal.manifest_filename.clone(),
        ));

        info!(entries = entries.len(), root = %self.root.display(), "building templates");
        let options = self.server_options(&entries);
        let mut bundler = RolldownBundlerBuilder::default()
            .with_options(options)
            .with_plugins(registry.into_rolldown_plugins())
            .build()
            .map_err(|e| Error::from_rolldown_batch(&e))?;

        let bundle = match bundler.generate().await {
            Ok(bundle) => bundle,
            Err(e) => {
                return Err(ctx
                    .take_failure()
                    .unwrap_or_else(|| Error::from_rolldown_batch(&e)));
            }
        };
        if let Some(failure) = ctx.take_failure() {
            return Err(failure);
        }

        let mut warnings = extract_warnings(&bundle.warnings);
        warnings.extend(ctx.diagnostics());

        let (manifest, child) = match ctx.take_child() {
            Some(child) => (child.manifest, Some(child.record)),
            None => (ChunkManifest::default(), None),
        };
        debug!(
            outputs = bundle.assets.len(),
            components = ctx.records().len(),
            warnings = warnings.len(),
            "server build finished"
        );

        Ok(BuildResult {
            assets: bundle.assets,
            manifest,
            entries,
            child,
            warnings,
            rendered: Vec::new(),
            render_failures: Vec::new(),
        })
    }

    fn server_options(&self, entries: &IndexMap<String, Entry>) -> BundlerOptions {
        BundlerOptions {
            input: Some(
                entries
                    .values()
                    .map(|entry| InputItem {
                        name: Some(format!("{SERVER_CHUNK_PREFIX}{}", entry.name)),
                        import: entry.source_path.to_string_lossy().to_string(),
                    })
                    .collect(),
            ),
            cwd: Some(self.root.clone()),
            platform: Some(Platform::Node),
            format: Some(OutputFormat::Esm),
            resolve: Some(crate::orchestrator::resolve_options(&self.root, Platform::Node)),
            ..Default::default()
        }
    }

    /// Render the templates of a written build into the output directory.
    pub async fn render(&self, result: &mut BuildResult) -> Result<()> {
        let out_dir = &self.config.build.out_dir;
        let mut jobs = Vec::with_capacity(result.entries.len());
        let mut missing = Vec::new();
        for entry in result.entries.values() {
            let Some(renderer) = self.config.build.renderers.get(&entry.template_type) else {
                continue;
            };
            let Some(module) = result.server_module(&entry.name) else {
                missing.push(Error::Generation {
                    path: entry.source_path.clone(),
                    message: "no server module was emitted for this template".to_string(),
                });
                continue;
            };
            jobs.push(RenderJob {
                entry: entry.clone(),
                module_path: out_dir.join(module),
                renderer: renderer.clone(),
            });
        }

        let renderer = TemplateRenderer::new(self.config.render.clone(), &self.root, out_dir)
            .with_public_path(self.config.build.public_path.clone())
            .with_environment(self.config.settings.environment.clone());
        let report = renderer.render(jobs, &result.manifest).await?;
        result.render_failures.extend(missing);
        result.rendered.extend(report.pages);
        result.render_failures.extend(report.failures);
        Ok(())
    }
}
