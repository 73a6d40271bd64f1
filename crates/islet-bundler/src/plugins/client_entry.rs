//! Serves generated client entries to the client build.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use rolldown_common::ModuleType;
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdReturn,
    HookUsage, Plugin, PluginContext,
};
use rustc_hash::FxHashMap;

use super::registry::{IsletPlugin, PluginPhase};
use super::{path_id, resolve_local, resolved};
use crate::codegen::{
    client_virtual_id, parse_client_specifier, runtime_virtual_id, RUNTIME_SPECIFIER,
};
use crate::tagger::{classify, ImportClass};

/// Client-side counterpart of the universal plugin.
///
/// `islet:client:<id>` resolves to the generated entry and `islet:runtime` to
/// the generated browser runtime. Tagged imports, escape hatch included,
/// resolve to the real module: the browser always runs the component itself.
#[derive(Debug, Clone)]
pub struct ClientEntryPlugin {
    modules: Arc<FxHashMap<String, String>>,
    root: PathBuf,
}

impl ClientEntryPlugin {
    pub fn new(modules: Arc<FxHashMap<String, String>>, root: impl Into<PathBuf>) -> Self {
        Self {
            modules,
            root: root.into(),
        }
    }
}

impl Plugin for ClientEntryPlugin {
    fn name(&self) -> Cow<'static, str> {
        "islet-client-entries".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Load
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let importer = args.importer.map(|s| s.to_string());
        let modules = Arc::clone(&self.modules);
        let root = self.root.clone();

        async move {
            if specifier == RUNTIME_SPECIFIER {
                let virtual_id = runtime_virtual_id();
                return Ok(modules
                    .contains_key(&virtual_id)
                    .then(|| resolved(virtual_id)));
            }
            if let Some(id) = parse_client_specifier(&specifier) {
                let virtual_id = client_virtual_id(id);
                if modules.contains_key(&virtual_id) {
                    return Ok(Some(resolved(virtual_id)));
                }
                return Ok(None);
            }

            let classified = classify(&specifier);
            if classified.class == ImportClass::Plain {
                return Ok(None);
            }
            Ok(resolve_local(&classified.original_path, importer.as_deref(), &root)
                .map(|path| resolved(path_id(&path))))
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let code = self.modules.get(&id).cloned();

        async move {
            Ok(code.map(|code| HookLoadOutput {
                code: code.into(),
                module_type: Some(ModuleType::Js),
                ..Default::default()
            }))
        }
    }
}

impl IsletPlugin for ClientEntryPlugin {
    fn phase(&self) -> PluginPhase {
        PluginPhase::Virtual
    }
}
