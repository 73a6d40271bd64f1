//! Nested client compilation.
//!
//! The outer (server) build discovers universal components while it resolves
//! modules. Their client entries are compiled by a second, browser-targeted
//! build that runs inside the outer build's `generate_bundle` phase:
//!
//! 1. the universal plugin registers the child compilation on the
//!    [`PhaseBarrier`] the first time it sees a universal import;
//! 2. `generate_bundle` waits on the barrier, which drives the child to
//!    completion through [`Orchestrator::run_child`];
//! 3. the child's assets are merged into the outer output and its chunk
//!    manifest is emitted next to them.
//!
//! The [`Orchestrator`] outlives single builds so watch rebuilds can reuse the
//! inner compiler while the set of universal components stays the same.

mod assets;
mod barrier;
mod compiler;
mod context;
mod rolldown_compiler;

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexSet;
use parking_lot::Mutex;
use rolldown_common::Output;
use serde::Serialize;
use tracing::{debug, info};

pub use assets::{check_collisions, merge_assets, output_filename};
pub use barrier::PhaseBarrier;
pub use compiler::{
    client_chunk_name, ClientCompilationConfig, ClientEntrySpec, CompilationOutput, Compiler,
    CompilerFactory, CompilerId,
};
pub use context::BuildContext;
pub(crate) use rolldown_compiler::resolve_options;
pub use rolldown_compiler::{RolldownCompiler, RolldownCompilerFactory};

use crate::diagnostics::ExtractedDiagnostic;
use crate::manifest::{ChunkManifest, ManifestError};
use crate::{Error, Result};

/// Statistics of one child compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildCompilationRecord {
    pub compiler_id: CompilerId,
    pub entries: Vec<String>,
    pub chunk_count: usize,
    pub asset_count: usize,
    pub duration_ms: u64,
    /// The inner compiler was carried over from the previous build.
    pub reused: bool,
}

/// Result of a successful child compilation.
pub struct ChildCompilation {
    pub assets: Vec<Output>,
    pub manifest: ChunkManifest,
    pub warnings: Vec<ExtractedDiagnostic>,
    pub record: ChildCompilationRecord,
}

impl std::fmt::Debug for ChildCompilation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildCompilation")
            .field("assets", &self.assets.len())
            .field("manifest", &self.manifest.len())
            .field("warnings", &self.warnings.len())
            .field("record", &self.record)
            .finish()
    }
}

struct ActiveCompiler {
    entries: IndexSet<String>,
    compiler: Arc<dyn Compiler>,
}

/// Creates, reuses and runs the inner compiler.
pub struct Orchestrator {
    factory: Arc<dyn CompilerFactory>,
    active: Mutex<Option<ActiveCompiler>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("factory", &self.factory)
            .field("active", &self.active_compiler())
            .finish()
    }
}

impl Orchestrator {
    /// Fails with [`Error::MissingManifestPlugin`] when compilers from
    /// `factory` cannot produce a chunk manifest.
    pub fn new(factory: Arc<dyn CompilerFactory>) -> Result<Self> {
        if !factory.emits_manifest() {
            return Err(Error::MissingManifestPlugin);
        }
        Ok(Self {
            factory,
            active: Mutex::new(None),
        })
    }

    /// Id of the compiler kept from the last run, if any.
    pub fn active_compiler(&self) -> Option<CompilerId> {
        self.active.lock().as_ref().map(|active| active.compiler.id())
    }

    /// Drop the kept compiler; the next run creates a fresh one.
    pub fn reset(&self) {
        self.active.lock().take();
    }

    /// Compile the client entries pending in `ctx`.
    pub async fn run_child(&self, ctx: &BuildContext) -> Result<ChildCompilation> {
        let config = ctx.client_config();
        let entries: IndexSet<String> = config.entry_ids().map(str::to_string).collect();
        let (compiler, reused) = self.compiler_for(&entries, &config)?;

        info!(
            compiler = %compiler.id(),
            entries = entries.len(),
            reused,
            "compiling client entries"
        );

        let started = Instant::now();
        let output = compiler
            .compile()
            .await
            .map_err(|err| attribute_to_entry(err, &config))?;

        let manifest = match output.manifest {
            Some(manifest) => manifest,
            None if config.require_manifest => return Err(Error::Manifest(ManifestError::Missing)),
            None => ChunkManifest::default(),
        };

        let chunk_count = output
            .assets
            .iter()
            .filter(|output| matches!(output, Output::Chunk(_)))
            .count();
        let record = ChildCompilationRecord {
            compiler_id: compiler.id(),
            entries: entries.into_iter().collect(),
            chunk_count,
            asset_count: output.assets.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            reused,
        };
        debug!(?record, "client compilation finished");

        Ok(ChildCompilation {
            assets: output.assets,
            manifest,
            warnings: output.warnings,
            record,
        })
    }

    fn compiler_for(
        &self,
        entries: &IndexSet<String>,
        config: &ClientCompilationConfig,
    ) -> Result<(Arc<dyn Compiler>, bool)> {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            if current.entries == *entries {
                return Ok((Arc::clone(&current.compiler), true));
            }
            debug!(
                previous = %current.compiler.id(),
                "universal entry set changed; recreating client compiler"
            );
        }

        let compiler = self.factory.create(config.clone())?;
        *active = Some(ActiveCompiler {
            entries: entries.clone(),
            compiler: Arc::clone(&compiler),
        });
        Ok((compiler, false))
    }
}

/// Tag a bundler failure with the client entry it came from.
///
/// The entry is the first one whose id or source path a diagnostic mentions;
/// without a match the whole entry set is named.
fn attribute_to_entry(err: Error, config: &ClientCompilationConfig) -> Error {
    let diagnostics = match err {
        Error::Bundler(diagnostics) => diagnostics,
        other => return other,
    };

    let entry = config
        .entries
        .iter()
        .find(|entry| {
            let path = entry.source_path.to_string_lossy();
            diagnostics
                .iter()
                .any(|d| d.mentions(&path) || d.mentions(&entry.id))
        })
        .map(|entry| entry.id.clone())
        .unwrap_or_else(|| config.entry_ids().collect::<Vec<_>>().join(", "));

    Error::ChildCompilation { entry, diagnostics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenOptions;
    use crate::diagnostics::ExtractedDiagnostic;
    use crate::tagger::WrapperKind;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeCompiler {
        id: CompilerId,
        fail_with: Option<String>,
    }

    #[async_trait::async_trait]
    impl Compiler for FakeCompiler {
        fn id(&self) -> CompilerId {
            self.id
        }

        async fn compile(&self) -> Result<CompilationOutput> {
            if let Some(message) = &self.fail_with {
                return Err(Error::Bundler(vec![ExtractedDiagnostic::other(
                    "Parse",
                    message.clone(),
                )]));
            }
            Ok(CompilationOutput {
                manifest: Some(ChunkManifest::default()),
                ..Default::default()
            })
        }
    }

    #[derive(Debug, Default)]
    struct FakeFactory {
        created: AtomicUsize,
        without_manifest: bool,
        fail_with: Option<String>,
    }

    impl CompilerFactory for FakeFactory {
        fn create(&self, _config: ClientCompilationConfig) -> Result<Arc<dyn Compiler>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeCompiler {
                id: CompilerId::next(),
                fail_with: self.fail_with.clone(),
            }))
        }

        fn emits_manifest(&self) -> bool {
            !self.without_manifest
        }
    }

    fn context_with(paths: &[&str]) -> BuildContext {
        let ctx = BuildContext::new("/app", CodegenOptions::default());
        for path in paths {
            ctx.register(Path::new(path), WrapperKind::Universal).unwrap();
        }
        ctx
    }

    #[test]
    fn missing_manifest_plugin_fails_setup() {
        let factory = Arc::new(FakeFactory {
            without_manifest: true,
            ..Default::default()
        });
        assert!(matches!(
            Orchestrator::new(factory),
            Err(Error::MissingManifestPlugin)
        ));
    }

    #[tokio::test]
    async fn compiler_is_reused_while_entries_are_unchanged() {
        let factory = Arc::new(FakeFactory::default());
        let orchestrator = Orchestrator::new(factory.clone()).unwrap();

        let first = orchestrator
            .run_child(&context_with(&["/app/src/Clock.js"]))
            .await
            .unwrap();
        let second = orchestrator
            .run_child(&context_with(&["/app/src/Clock.js"]))
            .await
            .unwrap();

        assert!(!first.record.reused);
        assert!(second.record.reused);
        assert_eq!(first.record.compiler_id, second.record.compiler_id);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entry_set_change_creates_a_distinct_compiler() {
        let factory = Arc::new(FakeFactory::default());
        let orchestrator = Orchestrator::new(factory.clone()).unwrap();

        let first = orchestrator
            .run_child(&context_with(&["/app/src/Clock.js"]))
            .await
            .unwrap();
        let second = orchestrator
            .run_child(&context_with(&["/app/src/Clock.js", "/app/src/Map.js"]))
            .await
            .unwrap();

        assert_ne!(first.record.compiler_id, second.record.compiler_id);
        assert_eq!(orchestrator.active_compiler(), Some(second.record.compiler_id));
        assert_eq!(
            second.record.entries,
            vec!["src_Clock_js".to_string(), "src_Map_js".to_string()]
        );
    }

    #[tokio::test]
    async fn failures_name_the_inner_entry() {
        let factory = Arc::new(FakeFactory {
            fail_with: Some("Unexpected token in /app/src/Map.js".to_string()),
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(factory).unwrap();

        let err = orchestrator
            .run_child(&context_with(&["/app/src/Clock.js", "/app/src/Map.js"]))
            .await
            .unwrap_err();
        match err {
            Error::ChildCompilation { entry, diagnostics } => {
                assert_eq!(entry, "src_Map_js");
                assert_eq!(diagnostics.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unattributable_failures_name_every_entry() {
        let factory = Arc::new(FakeFactory {
            fail_with: Some("out of memory".to_string()),
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(factory).unwrap();

        let err = orchestrator
            .run_child(&context_with(&["/app/src/B.js", "/app/src/A.js"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ChildCompilation { ref entry, .. } if entry == "src_A_js, src_B_js"
        ));
    }

    #[tokio::test]
    async fn scheduled_child_runs_when_the_barrier_is_awaited() {
        let factory = Arc::new(FakeFactory::default());
        let orchestrator = Arc::new(Orchestrator::new(factory).unwrap());
        let ctx = Arc::new(context_with(&["/app/src/Clock.js"]));

        ctx.schedule_child(Arc::clone(&orchestrator));
        ctx.schedule_child(Arc::clone(&orchestrator));
        assert_eq!(ctx.barrier().pending(), 1);

        // Registered after scheduling, still part of the child compilation.
        ctx.register(&PathBuf::from("/app/src/Late.js"), WrapperKind::Universal)
            .unwrap();

        ctx.barrier().wait_all().await.unwrap();
        let child = ctx.take_child().unwrap();
        assert_eq!(child.record.entries, vec!["src_Clock_js", "src_Late_js"]);
    }
}
