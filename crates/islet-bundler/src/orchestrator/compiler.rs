use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rolldown_common::Output;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::diagnostics::ExtractedDiagnostic;
use crate::manifest::ChunkManifest;
use crate::Result;

static NEXT_COMPILER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one inner compiler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CompilerId(u64);

impl CompilerId {
    /// A fresh id, distinct from every id handed out before in this process.
    pub fn next() -> Self {
        Self(NEXT_COMPILER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CompilerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "compiler#{}", self.0)
    }
}

/// One client entry of the inner compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntrySpec {
    /// Generated component id.
    pub id: String,
    /// Real component module the entry hydrates.
    pub source_path: PathBuf,
    /// Specifier the inner build resolves (`islet:client:<id>`).
    pub specifier: String,
}

/// Inputs of the inner browser compilation, derived from the outer build.
#[derive(Debug, Clone)]
pub struct ClientCompilationConfig {
    pub root: PathBuf,
    pub entries: Vec<ClientEntrySpec>,
    /// Client entry sources keyed by resolved virtual id.
    pub modules: Arc<FxHashMap<String, String>>,
    pub minify: bool,
    pub require_manifest: bool,
}

impl ClientCompilationConfig {
    pub fn entry_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }
}

/// What one inner compilation produced.
#[derive(Debug, Default)]
pub struct CompilationOutput {
    pub assets: Vec<Output>,
    pub manifest: Option<ChunkManifest>,
    pub warnings: Vec<ExtractedDiagnostic>,
}

#[async_trait]
pub trait Compiler: Send + Sync + std::fmt::Debug {
    fn id(&self) -> CompilerId;

    async fn compile(&self) -> Result<CompilationOutput>;
}

pub trait CompilerFactory: Send + Sync + std::fmt::Debug {
    fn create(&self, config: ClientCompilationConfig) -> Result<Arc<dyn Compiler>>;

    /// Whether compilers from this factory produce a chunk manifest.
    fn emits_manifest(&self) -> bool;
}

/// Name of the inner chunk holding the client entry of component `id`.
pub fn client_chunk_name(id: &str) -> String {
    format!("assets/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiler_ids_are_distinct() {
        let a = CompilerId::next();
        let b = CompilerId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn chunk_names_live_under_assets() {
        assert_eq!(client_chunk_name("src_Clock_js"), "assets/src_Clock_js");
    }
}
