//! Server-side universal component handling.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use rolldown_common::{ModuleType, Output, OutputAsset};
use rolldown_plugin::{
    HookGenerateBundleArgs, HookLoadArgs, HookLoadOutput, HookLoadReturn, HookNoopReturn,
    HookResolveIdArgs, HookResolveIdReturn, HookUsage, Plugin, PluginContext,
};
use tracing::{debug, info};

use super::registry::{IsletPlugin, PluginPhase};
use super::{external, path_id, resolve_local, resolved};
use crate::codegen::{markers_virtual_id, MARKERS_SPECIFIER};
use crate::orchestrator::{merge_assets, BuildContext, Orchestrator};
use crate::tagger::{classify, ImportClass};
use crate::Error;

/// Plugin driving universal components through the server build.
///
/// - tagged imports resolve to generated server wrappers, registering the
///   component and scheduling the client compilation;
/// - escape hatch imports resolve to the real module;
/// - bare package imports stay external and are loaded by the render process;
/// - `generate_bundle` waits for the client compilation, merges its outputs
///   and emits the chunk manifest.
#[derive(Debug, Clone)]
pub struct UniversalPlugin {
    ctx: Arc<BuildContext>,
    orchestrator: Arc<Orchestrator>,
    manifest_filename: String,
}

impl UniversalPlugin {
    pub fn new(
        ctx: Arc<BuildContext>,
        orchestrator: Arc<Orchestrator>,
        manifest_filename: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            orchestrator,
            manifest_filename: manifest_filename.into(),
        }
    }
}

/// Keep the typed error for the build result and hand Rolldown its message.
fn fail(ctx: &BuildContext, err: Error) -> anyhow::Error {
    let reported = anyhow::anyhow!(err.to_string());
    ctx.record_failure(err);
    reported
}

fn is_bare(specifier: &str) -> bool {
    !(specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.starts_with('\0')
        || specifier.starts_with("islet:")
        || std::path::Path::new(specifier).is_absolute())
}

impl Plugin for UniversalPlugin {
    fn name(&self) -> Cow<'static, str> {
        "islet-universal".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Load | HookUsage::GenerateBundle
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let importer = args.importer.map(|s| s.to_string());
        let ctx = Arc::clone(&self.ctx);
        let orchestrator = Arc::clone(&self.orchestrator);

        async move {
            if specifier == MARKERS_SPECIFIER {
                return Ok(Some(resolved(markers_virtual_id())));
            }
            if specifier.starts_with('\0') {
                return Ok(None);
            }

            let classified = classify(&specifier);
            match classified.class {
                ImportClass::Plain if is_bare(&specifier) => Ok(Some(external(specifier))),
                ImportClass::Plain => Ok(None),
                ImportClass::Tagged {
                    escape_hatch: true,
                    ..
                } => Ok(
                    resolve_local(&classified.original_path, importer.as_deref(), ctx.root())
                        .map(|path| resolved(path_id(&path))),
                ),
                ImportClass::Tagged { kind, .. } => {
                    let Some(path) =
                        resolve_local(&classified.original_path, importer.as_deref(), ctx.root())
                    else {
                        let origin = importer.map(PathBuf::from).unwrap_or_default();
                        return Err(fail(
                            &ctx,
                            Error::Generation {
                                path: origin,
                                message: format!(
                                    "universal import `{specifier}` must be a relative or absolute path"
                                ),
                            },
                        ));
                    };

                    let id = ctx.register(&path, kind).map_err(|err| fail(&ctx, err))?;
                    ctx.schedule_child(orchestrator);
                    Ok(Some(resolved(id)))
                }
            }
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let code = if id.starts_with('\0') {
            self.ctx.module(&id)
        } else {
            None
        };

        async move {
            Ok(code.map(|code| HookLoadOutput {
                code: code.into(),
                module_type: Some(ModuleType::Js),
                ..Default::default()
            }))
        }
    }

    fn generate_bundle(
        &self,
        _ctx: &PluginContext,
        args: &mut HookGenerateBundleArgs<'_>,
    ) -> impl std::future::Future<Output = HookNoopReturn> + Send {
        let ctx = Arc::clone(&self.ctx);
        let manifest_filename = self.manifest_filename.clone();

        async move {
            ctx.barrier().wait_all().await.map_err(|err| fail(&ctx, err))?;

            let (client_assets, manifest) = ctx.child_outputs();
            let merged = client_assets.len();
            merge_assets(args.bundle, client_assets).map_err(|err| fail(&ctx, err))?;

            let json = manifest
                .to_json()
                .map_err(|err| fail(&ctx, Error::Io(err.into())))?;
            let manifest_asset = vec![Output::Asset(Arc::new(OutputAsset {
                names: vec![],
                original_file_names: vec![],
                filename: manifest_filename.clone().into(),
                source: json.into(),
            }))];
            merge_assets(args.bundle, manifest_asset).map_err(|err| fail(&ctx, err))?;

            if merged > 0 {
                info!(
                    assets = merged,
                    chunks = manifest.len(),
                    manifest = %manifest_filename,
                    "merged client compilation"
                );
            } else {
                debug!(manifest = %manifest_filename, "no universal components; empty manifest");
            }
            Ok(())
        }
    }
}

impl IsletPlugin for UniversalPlugin {
    fn phase(&self) -> PluginPhase {
        PluginPhase::Virtual
    }
}
