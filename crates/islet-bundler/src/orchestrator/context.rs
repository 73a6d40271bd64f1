use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rolldown_common::Output;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::barrier::PhaseBarrier;
use super::compiler::{ClientCompilationConfig, ClientEntrySpec};
use super::{ChildCompilation, Orchestrator};
use crate::codegen::{
    self, client_entry, marker_helper_module, runtime_module, server_wrapper, CodegenOptions,
    GeneratedModule, UniversalImportRecord,
};
use crate::diagnostics::ExtractedDiagnostic;
use crate::manifest::ChunkManifest;
use crate::tagger::WrapperKind;
use crate::{Error, Result};

/// State of one outer build.
///
/// Created per build and shared with the plugins of that build only. Holds the
/// universal records seen so far, the generated modules served from memory,
/// the phase barrier the child compilation is registered on and whatever the
/// child produced.
#[derive(Debug)]
pub struct BuildContext {
    root: PathBuf,
    minify: bool,
    codegen: CodegenOptions,
    records: Mutex<IndexMap<String, UniversalImportRecord>>,
    modules: Mutex<FxHashMap<String, GeneratedModule>>,
    barrier: PhaseBarrier,
    child_scheduled: AtomicBool,
    child: Mutex<Option<ChildCompilation>>,
    failure: Mutex<Option<Error>>,
    diagnostics: Mutex<Vec<ExtractedDiagnostic>>,
}

impl BuildContext {
    pub fn new(root: impl Into<PathBuf>, codegen: CodegenOptions) -> Self {
        let helper = marker_helper_module();
        let mut modules = FxHashMap::default();
        modules.insert(helper.virtual_path.clone(), helper);

        Self {
            root: root.into(),
            minify: false,
            codegen,
            records: Mutex::new(IndexMap::new()),
            modules: Mutex::new(modules),
            barrier: PhaseBarrier::new(),
            child_scheduled: AtomicBool::new(false),
            child: Mutex::new(None),
            failure: Mutex::new(None),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn barrier(&self) -> &PhaseBarrier {
        &self.barrier
    }

    /// Record a universal import and generate its modules.
    ///
    /// Returns the resolved id of the server wrapper. Registering the same
    /// file again is a no-op; a different file whose id collides with an
    /// existing one is rejected.
    pub fn register(&self, source_path: &Path, kind: WrapperKind) -> Result<String> {
        let record = UniversalImportRecord::new(source_path, &self.root, kind);
        let server_id = record.server_virtual_id();

        let mut records = self.records.lock();
        let is_new = match records.get(&record.generated_id) {
            Some(existing) if existing.source_path != record.source_path => {
                return Err(Error::IdentifierCollision {
                    id: record.generated_id.clone(),
                    first: existing.source_path.clone(),
                    second: record.source_path.clone(),
                });
            }
            Some(_) => false,
            None => true,
        };

        let mut modules = self.modules.lock();
        if !modules.contains_key(&server_id) {
            let module = server_wrapper(&record, &self.codegen);
            modules.insert(module.virtual_path.clone(), module);
        }
        if is_new {
            let module = client_entry(&record, &self.codegen);
            modules.insert(module.virtual_path.clone(), module);
            debug!(
                id = %record.generated_id,
                path = %record.source_path.display(),
                ?kind,
                "registered universal component"
            );
            records.insert(record.generated_id.clone(), record);
        }

        Ok(server_id)
    }

    /// Source of a generated module by resolved id.
    pub fn module(&self, virtual_id: &str) -> Option<String> {
        self.modules.lock().get(virtual_id).map(|m| m.source.clone())
    }

    pub fn records(&self) -> Vec<UniversalImportRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Component ids awaiting the client compilation, in registration order.
    pub fn pending_entries(&self) -> Vec<String> {
        self.records.lock().keys().cloned().collect()
    }

    pub fn has_universal_components(&self) -> bool {
        !self.records.lock().is_empty()
    }

    /// Configuration of the inner compilation for the current record set.
    ///
    /// Entries are sorted by id so equal sets produce equal builds. The
    /// generated runtime is served alongside the entries unless a custom
    /// runtime module is configured.
    pub fn client_config(&self) -> ClientCompilationConfig {
        let mut records = self.records();
        records.sort_by(|a, b| a.generated_id.cmp(&b.generated_id));

        let modules = self.modules.lock();
        let mut client_modules: FxHashMap<String, String> = records
            .iter()
            .filter_map(|record| {
                let id = record.client_virtual_id();
                modules.get(&id).map(|m| (id, m.source.clone()))
            })
            .collect();
        if self.codegen.uses_generated_runtime() && !records.is_empty() {
            let runtime = runtime_module(&self.codegen);
            client_modules.insert(runtime.virtual_path, runtime.source);
        }

        ClientCompilationConfig {
            root: self.root.clone(),
            entries: records
                .into_iter()
                .map(|record| ClientEntrySpec {
                    specifier: codegen::client_specifier(&record.generated_id),
                    id: record.generated_id,
                    source_path: record.source_path,
                })
                .collect(),
            modules: Arc::new(client_modules),
            minify: self.minify,
            require_manifest: true,
        }
    }

    /// Register the child compilation on the barrier, once per build.
    ///
    /// The task reads the record set when the barrier drives it, so components
    /// registered after this call are still compiled.
    pub fn schedule_child(self: &Arc<Self>, orchestrator: Arc<Orchestrator>) {
        if self.child_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let ctx = Arc::downgrade(self);
        self.barrier.register(async move {
            let Some(ctx) = ctx.upgrade() else {
                return Ok(());
            };
            let child = orchestrator.run_child(&ctx).await?;
            ctx.diagnostics.lock().extend(child.warnings.iter().cloned());
            *ctx.child.lock() = Some(child);
            Ok(())
        });
    }

    pub fn child_scheduled(&self) -> bool {
        self.child_scheduled.load(Ordering::Acquire)
    }

    /// Client outputs and manifest to merge into the server bundle.
    ///
    /// Without a child compilation both are empty.
    pub fn child_outputs(&self) -> (Vec<Output>, ChunkManifest) {
        match self.child.lock().as_ref() {
            Some(child) => (child.assets.clone(), child.manifest.clone()),
            None => (Vec::new(), ChunkManifest::default()),
        }
    }

    pub fn take_child(&self) -> Option<ChildCompilation> {
        self.child.lock().take()
    }

    /// Remember a failure raised inside a plugin hook so the build can report
    /// the typed error instead of Rolldown's wrapped one. The first failure
    /// wins.
    pub fn record_failure(&self, error: Error) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    pub fn take_failure(&self) -> Option<Error> {
        self.failure.lock().take()
    }

    pub fn diagnostics(&self) -> Vec<ExtractedDiagnostic> {
        self.diagnostics.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> BuildContext {
        BuildContext::new("/app", CodegenOptions::default())
    }

    #[test]
    fn registration_generates_server_and_client_modules() {
        let ctx = context();
        let id = ctx
            .register(Path::new("/app/src/Clock.js"), WrapperKind::Universal)
            .unwrap();
        assert_eq!(id, "\0islet:server:src_Clock_js");
        assert!(ctx.module(&id).is_some());
        assert!(ctx.module("\0islet:client:src_Clock_js").is_some());
        assert!(ctx.module("\0islet:markers").is_some());
        assert_eq!(ctx.pending_entries(), vec!["src_Clock_js"]);
    }

    #[test]
    fn both_wrapper_kinds_share_one_client_entry() {
        let ctx = context();
        let regular = ctx
            .register(Path::new("/app/src/Clock.js"), WrapperKind::Universal)
            .unwrap();
        let containerless = ctx
            .register(Path::new("/app/src/Clock.js"), WrapperKind::ContainerlessUniversal)
            .unwrap();
        assert_ne!(regular, containerless);
        assert!(ctx.module(&containerless).is_some());
        assert_eq!(ctx.client_config().entries.len(), 1);
    }

    #[test]
    fn colliding_identifiers_are_rejected() {
        let ctx = context();
        ctx.register(Path::new("/app/a_b.js"), WrapperKind::Universal)
            .unwrap();
        let err = ctx
            .register(Path::new("/app/a/b.js"), WrapperKind::Universal)
            .unwrap_err();
        match err {
            Error::IdentifierCollision { id, first, second } => {
                assert_eq!(id, "a_b_js");
                assert_eq!(first, PathBuf::from("/app/a_b.js"));
                assert_eq!(second, PathBuf::from("/app/a/b.js"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn client_config_is_sorted_by_id() {
        let ctx = context().with_minify(true);
        ctx.register(Path::new("/app/src/Zebra.js"), WrapperKind::Universal)
            .unwrap();
        ctx.register(Path::new("/app/src/Apple.js"), WrapperKind::Universal)
            .unwrap();

        let config = ctx.client_config();
        let ids: Vec<_> = config.entry_ids().collect();
        assert_eq!(ids, vec!["src_Apple_js", "src_Zebra_js"]);
        assert_eq!(config.entries[0].specifier, "islet:client:src_Apple_js");
        assert!(config.minify);
        // two entries and the generated runtime
        assert_eq!(config.modules.len(), 3);
        assert!(config.modules.contains_key("\0islet:runtime"));
    }

    #[test]
    fn custom_runtime_module_is_not_generated() {
        let codegen = CodegenOptions {
            runtime_module: "/app/lib/runtime.js".to_string(),
            ..Default::default()
        };
        let ctx = BuildContext::new("/app", codegen);
        ctx.register(Path::new("/app/src/Clock.js"), WrapperKind::Universal)
            .unwrap();

        let config = ctx.client_config();
        assert_eq!(config.modules.len(), 1);
        assert!(!config.modules.contains_key("\0islet:runtime"));
    }

    #[test]
    fn first_failure_wins() {
        let ctx = context();
        ctx.record_failure(Error::InvalidConfig("first".to_string()));
        ctx.record_failure(Error::InvalidConfig("second".to_string()));
        assert!(matches!(ctx.take_failure(), Some(Error::InvalidConfig(m)) if m == "first"));
        assert!(ctx.take_failure().is_none());
    }
}
