//! Chunk manifest for the client compilation.
//!
//! The manifest maps every emitted chunk to its file and tells pages which
//! scripts to load, in which order, for a given entry. It is serialized as
//!
//! ```json
//! { "assets/src_Clock_js": { "filename": "assets/src_Clock_js.js",
//!                            "hasRuntime": false, "isShared": false,
//!                            "dependencies": ["rolldown-runtime"],
//!                            "imports": ["rolldown-runtime"] } }
//! ```
//!
//! `imports` keeps the direct import graph so a manifest read back from disk
//! yields the same load order as the one computed during the build.
//!
//! Chunks reachable from more than one entry are *shared* and list no
//! dependencies of their own; their loading is driven by the entries that
//! import them.

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Errors raised while computing or querying a chunk manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("entry `{entry}` loads more than one runtime chunk: {}", .chunks.join(", "))]
    MultipleRuntimeChunks { entry: String, chunks: Vec<String> },

    #[error("chunk `{chunk}` imports unknown file `{dependency}`")]
    UnknownDependency { chunk: String, dependency: String },

    #[error("no chunk named `{0}` in the manifest")]
    UnknownChunk(String),

    #[error("the client compilation produced no chunk manifest")]
    Missing,
}

/// What the manifest needs to know about one emitted chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Chunk name; unnamed chunks are recorded under their filename stem.
    pub name: Option<String>,
    pub is_entry: bool,
    pub has_runtime: bool,
    /// Filenames of the chunks this chunk imports statically.
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkManifestEntry {
    pub filename: String,
    pub has_runtime: bool,
    pub is_shared: bool,
    /// Chunks that must load before this one, dependencies first.
    /// `None` for shared chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    /// Direct imports by chunk name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

/// Collects chunks as the compiler emits them.
#[derive(Debug, Default)]
pub struct ChunkManifestBuilder {
    chunks: IndexMap<String, (ChunkRecord, String)>,
}

impl ChunkManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_chunk_emitted(&mut self, chunk: ChunkRecord, filename: impl Into<String>) {
        let filename = filename.into();
        let stem = file_stem(&filename);
        let mut name = chunk.name.clone().unwrap_or_else(|| stem.clone());
        if self
            .chunks
            .get(&name)
            .is_some_and(|(_, existing)| *existing != filename)
        {
            // Rolldown reuses names for split chunks; the filename is unique.
            name = filename.clone();
        }
        self.chunks.insert(name, (chunk, filename));
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn finalize(self) -> Result<ChunkManifest, ManifestError> {
        let by_filename: FxHashMap<&str, &str> = self
            .chunks
            .iter()
            .map(|(name, (_, filename))| (filename.as_str(), name.as_str()))
            .collect();

        let mut imports: IndexMap<&str, Vec<String>> = IndexMap::new();
        for (name, (record, _)) in &self.chunks {
            let mut resolved = Vec::with_capacity(record.imports.len());
            for dependency in &record.imports {
                let Some(target) = by_filename.get(dependency.as_str()) else {
                    return Err(ManifestError::UnknownDependency {
                        chunk: name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                if !resolved.iter().any(|r: &String| r == target) {
                    resolved.push((*target).to_string());
                }
            }
            imports.insert(name.as_str(), resolved);
        }

        let graph = |name: &str| imports.get(name).map(Vec::as_slice).unwrap_or(&[]);

        // Entry groups: every chunk an entry reaches, itself included.
        let mut membership: FxHashMap<&str, usize> = FxHashMap::default();
        for (name, (record, _)) in &self.chunks {
            if !record.is_entry {
                continue;
            }
            let group = post_order(name, &graph);
            let runtimes: Vec<String> = group
                .iter()
                .filter(|member| {
                    self.chunks
                        .get(member.as_str())
                        .is_some_and(|(r, _)| r.has_runtime)
                })
                .cloned()
                .collect();
            if runtimes.len() > 1 {
                return Err(ManifestError::MultipleRuntimeChunks {
                    entry: name.clone(),
                    chunks: runtimes,
                });
            }
            for member in &group {
                if let Some((key, _)) = self.chunks.get_key_value(member.as_str()) {
                    *membership.entry(key.as_str()).or_default() += 1;
                }
            }
        }

        let mut entries = IndexMap::with_capacity(self.chunks.len());
        for (name, (record, filename)) in &self.chunks {
            let is_shared = membership.get(name.as_str()).copied().unwrap_or(0) > 1;
            let dependencies = (!is_shared).then(|| {
                let mut order = post_order(name, &graph);
                order.pop();
                order
            });
            entries.insert(
                name.clone(),
                ChunkManifestEntry {
                    filename: filename.clone(),
                    has_runtime: record.has_runtime,
                    is_shared,
                    dependencies,
                    imports: graph(name.as_str()).to_vec(),
                },
            );
        }

        Ok(ChunkManifest { entries })
    }
}

/// Finalized manifest, keyed by chunk name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkManifest {
    entries: IndexMap<String, ChunkManifestEntry>,
}

impl ChunkManifest {
    pub fn get(&self, name: &str) -> Option<&ChunkManifestEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkManifestEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filenames to load for `start`: the runtime chunk first, then every
    /// transitive dependency exactly once before its importers, then `start`.
    pub fn load_order(&self, start: &str) -> Result<Vec<&str>, ManifestError> {
        self.load_order_all(&[start])
    }

    /// Combined load order for several chunks on one page.
    pub fn load_order_all(&self, starts: &[&str]) -> Result<Vec<&str>, ManifestError> {
        let mut visited = IndexSet::new();
        for start in starts {
            if !self.entries.contains_key(*start) {
                return Err(ManifestError::UnknownChunk((*start).to_string()));
            }
            let graph = |name: &str| {
                self.entries
                    .get(name)
                    .map(|entry| entry.imports.as_slice())
                    .unwrap_or(&[])
            };
            for name in post_order(start, &graph) {
                visited.insert(name);
            }
        }

        let (runtime, rest): (Vec<String>, Vec<String>) = visited
            .into_iter()
            .partition(|name| self.entries.get(name).is_some_and(|e| e.has_runtime));

        Ok(runtime
            .iter()
            .chain(rest.iter())
            .filter_map(|name| self.entries.get(name).map(|e| e.filename.as_str()))
            .collect())
    }

    /// `<script type="module">` tags for `start` under `public_path`.
    pub fn script_tags(&self, start: &str, public_path: &str) -> Result<String, ManifestError> {
        self.script_tags_all(&[start], public_path)
    }

    pub fn script_tags_all(
        &self,
        starts: &[&str],
        public_path: &str,
    ) -> Result<String, ManifestError> {
        let prefix = if public_path.ends_with('/') {
            public_path.to_string()
        } else {
            format!("{public_path}/")
        };
        Ok(self
            .load_order_all(starts)?
            .into_iter()
            .map(|filename| format!("<script type=\"module\" src=\"{prefix}{filename}\"></script>"))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Read a manifest artifact written by [`ChunkManifest::to_json`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Depth-first post-order from `start`: dependencies before importers,
/// each chunk once, `start` last.
fn post_order<'a, F>(start: &str, graph: &F) -> Vec<String>
where
    F: Fn(&str) -> &'a [String],
{
    fn visit<'a, F>(name: &str, graph: &F, seen: &mut FxHashSet<String>, out: &mut Vec<String>)
    where
        F: Fn(&str) -> &'a [String],
    {
        if !seen.insert(name.to_string()) {
            return;
        }
        for dependency in graph(name) {
            visit(dependency, graph, seen, out);
        }
        out.push(name.to_string());
    }

    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    visit(start, graph, &mut seen, &mut out);
    out
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}
