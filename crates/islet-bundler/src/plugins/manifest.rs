//! Records the chunk manifest of the client build.

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use rolldown_common::Output;
use rolldown_plugin::{HookGenerateBundleArgs, HookNoopReturn, HookUsage, Plugin, PluginContext};
use tracing::debug;

use super::registry::{IsletPlugin, PluginPhase};
use crate::manifest::{ChunkManifest, ChunkManifestBuilder, ChunkRecord, ManifestError};

/// Where the finished manifest (or the reason there is none) is left.
pub type ManifestSlot = Arc<Mutex<Option<Result<ChunkManifest, ManifestError>>>>;

/// Module id Rolldown gives its runtime helpers.
const RUNTIME_MODULE_MARKERS: &[&str] = &["rolldown:runtime", "rolldown/runtime"];

#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    slot: ManifestSlot,
}

impl ManifestPlugin {
    pub fn new(slot: ManifestSlot) -> Self {
        Self { slot }
    }
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> Cow<'static, str> {
        "islet-chunk-manifest".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::GenerateBundle
    }

    fn generate_bundle(
        &self,
        _ctx: &PluginContext,
        args: &mut HookGenerateBundleArgs<'_>,
    ) -> impl std::future::Future<Output = HookNoopReturn> + Send {
        let slot = Arc::clone(&self.slot);

        async move {
            let mut builder = ChunkManifestBuilder::new();
            for output in args.bundle.iter() {
                if let Output::Chunk(chunk) = output {
                    let has_runtime = chunk.module_ids.iter().any(|id| {
                        let id = id.to_string();
                        RUNTIME_MODULE_MARKERS.iter().any(|marker| id.contains(marker))
                    });
                    builder.on_chunk_emitted(
                        ChunkRecord {
                            name: Some(chunk.name.to_string()),
                            is_entry: chunk.is_entry,
                            has_runtime,
                            imports: chunk.imports.iter().map(|s| s.to_string()).collect(),
                        },
                        chunk.filename.to_string(),
                    );
                }
            }

            debug!(chunks = builder.len(), "finalizing chunk manifest");
            let result = builder.finalize();
            let failure = result.as_ref().err().cloned();
            *slot.lock() = Some(result);

            match failure {
                Some(err) => Err(anyhow::Error::new(err)),
                None => Ok(()),
            }
        }
    }
}

impl IsletPlugin for ManifestPlugin {
    fn phase(&self) -> PluginPhase {
        PluginPhase::PostProcess
    }
}
