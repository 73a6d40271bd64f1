#![cfg_attr(docsrs, feature(doc_cfg))]

//! # islet-bundler
//!
//! Universal-component build pipeline on top of Rolldown.
//!
//! A page tree is compiled for the server. Every import tagged as *universal*
//! (`./Clock.js?universal`, `./Clock.universal.js`) is swapped for a generated
//! server wrapper that renders the component inside a marker triple, and a
//! generated client entry that hydrates those regions in the browser. The
//! client entries are compiled by a nested browser build whose chunk manifest
//! lets pages emit the right `<script>` tags.
//!
//! ## Quick Start
//!
//! ```no_run
//! use islet_bundler::IsletBuild;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let build = IsletBuild::discover("./site", None)?;
//! let result = build.run().await?;
//!
//! for page in &result.rendered {
//!     println!("rendered {}", page.output_path.display());
//! }
//! # Ok(()) }
//! ```

pub mod build;
pub mod codegen;
pub mod diagnostics;
pub mod entries;
pub mod manifest;
pub mod orchestrator;
pub mod plugins;
pub mod render;
pub mod tagger;

// Re-export core Rolldown types for library users
pub use rolldown::{BundleOutput, BundlerOptions, InputItem, OutputFormat, Platform};
pub use rolldown_common::{Output, OutputAsset, OutputChunk};
pub use rolldown_plugin::__inner::SharedPluginable;

pub use build::{BuildResult, BuildSummary, IsletBuild, WatchSession};
pub use codegen::{
    generated_id, CodegenOptions, GeneratedKind, GeneratedModule, UniversalImportRecord,
};
pub use entries::{find_entries, patterns_for, Entry, EntryPattern};
pub use manifest::{
    ChunkManifest, ChunkManifestBuilder, ChunkManifestEntry, ChunkRecord, ManifestError,
};
pub use orchestrator::{
    client_chunk_name, merge_assets, BuildContext, ChildCompilation, ChildCompilationRecord,
    ClientCompilationConfig, ClientEntrySpec, CompilationOutput, Compiler, CompilerFactory,
    CompilerId, Orchestrator, PhaseBarrier, RolldownCompiler, RolldownCompilerFactory,
};
pub use plugins::{
    ClientEntryPlugin, IsletPlugin, ManifestPlugin, PluginPhase, PluginRegistry, UniversalPlugin,
};
pub use render::{
    inject_scripts, RenderError, RenderJob, RenderReport, RenderedPage, TemplateRenderer,
};
pub use tagger::{classify, ClassifiedImport, ImportClass, WrapperKind};

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env, init_logging_from_settings};

use std::path::PathBuf;

/// Error types for islet-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from the outer Rolldown build.
    #[error("Rolldown bundler error: {}", format_bundler_error(.0))]
    Bundler(Vec<diagnostics::ExtractedDiagnostic>),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The inner compiler would not produce a chunk manifest.
    #[error("client compilation is missing the manifest plugin")]
    MissingManifestPlugin,

    /// A universal module could not be generated.
    #[error("cannot generate universal module for {}: {message}", .path.display())]
    Generation { path: PathBuf, message: String },

    /// Two source paths transliterate to the same generated identifier.
    #[error(
        "generated identifier `{id}` is shared by {} and {}",
        .first.display(),
        .second.display()
    )]
    IdentifierCollision {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The client compilation failed.
    #[error("client compilation failed for `{entry}`: {}", format_bundler_error(.diagnostics))]
    ChildCompilation {
        entry: String,
        diagnostics: Vec<diagnostics::ExtractedDiagnostic>,
    },

    /// The client and server compilations both emit the same file.
    #[error("asset `{filename}` is emitted by both the server and client compilations")]
    AssetCollision { filename: String },

    /// Chunk manifest computation failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A template failed to render.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] islet_config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),
}

/// Result type alias for islet-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a bundler error from a Rolldown error.
    pub fn from_rolldown_batch(error: &dyn std::fmt::Debug) -> Self {
        Error::Bundler(diagnostics::extract_from_rolldown_error(error))
    }

    /// Diagnostics carried by the error, if it wraps bundler output.
    pub fn diagnostics(&self) -> &[diagnostics::ExtractedDiagnostic] {
        match self {
            Error::Bundler(diagnostics) | Error::ChildCompilation { diagnostics, .. } => {
                diagnostics
            }
            _ => &[],
        }
    }
}

fn format_bundler_error(diagnostics: &[diagnostics::ExtractedDiagnostic]) -> String {
    match diagnostics {
        [] => "Unknown bundler error".to_string(),
        [diag] => format!("{}: {}", diag.kind, diag.message),
        many => format!(
            "{} errors: {}",
            many.len(),
            many.iter()
                .map(|d| format!("{}: {}", d.kind, d.message))
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Bundler(_) => "BUNDLER_ERROR",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::MissingManifestPlugin => "MISSING_MANIFEST_PLUGIN",
            Error::Generation { .. } => "GENERATION_ERROR",
            Error::IdentifierCollision { .. } => "IDENTIFIER_COLLISION",
            Error::ChildCompilation { .. } => "CHILD_COMPILATION_ERROR",
            Error::AssetCollision { .. } => "ASSET_COLLISION",
            Error::Manifest(_) => "MANIFEST_ERROR",
            Error::Render(_) => "RENDER_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check islet.toml (or the `islet` key in package.json).\nError: {}",
                msg
            ))),
            Error::MissingManifestPlugin => Some(Box::new(
                "The client compiler must register the chunk manifest plugin; \
                 pages cannot emit script tags without it.",
            )),
            Error::Generation { path, .. } => Some(Box::new(format!(
                "Universal imports must be relative or absolute paths.\nImported from: {}",
                path.display()
            ))),
            Error::IdentifierCollision { .. } => Some(Box::new(
                "Identifiers replace `/` and `.` with `_`; rename one of the files so \
                 their paths differ after that substitution.",
            )),
            Error::AssetCollision { filename } => Some(Box::new(format!(
                "Rename the server entry or component that produces '{}'.",
                filename
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it stays inside the output directory.",
                path
            ))),
            Error::Bundler(diagnostics) | Error::ChildCompilation { diagnostics, .. } => {
                if diagnostics.len() == 1 {
                    diagnostics[0]
                        .help
                        .as_ref()
                        .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>)
                } else {
                    Some(Box::new(
                        "Multiple bundler errors occurred. See details below.".to_string(),
                    ))
                }
            }
            _ => None,
        }
    }
}
