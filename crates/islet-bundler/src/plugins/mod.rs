//! Rolldown plugins.
//!
//! - [`UniversalPlugin`] runs in the server build: swaps universal imports for
//!   generated wrappers, schedules the client compilation and emits its
//!   outputs and manifest.
//! - [`ClientEntryPlugin`] and [`ManifestPlugin`] run in the client build:
//!   they serve the generated client entries and record the chunk manifest.

pub mod client_entry;
pub mod manifest;
pub mod registry;
pub mod universal;

pub use client_entry::ClientEntryPlugin;
pub use manifest::{ManifestPlugin, ManifestSlot};
pub use registry::{IsletPlugin, PluginPhase, PluginRegistry};
pub use universal::UniversalPlugin;

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use rolldown_common::ResolvedExternal;
use rolldown_plugin::HookResolveIdOutput;

use crate::entries::TEMPLATE_EXTENSIONS;

/// Resolve a relative or absolute module path the way the tagger reports it.
///
/// Relative paths are taken from the importer's directory, or from `root` when
/// the importer is missing or virtual. Bare specifiers return `None`. A path
/// without extension picks the first existing script file.
pub(crate) fn resolve_local(path: &str, importer: Option<&str>, root: &Path) -> Option<PathBuf> {
    let candidate = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else if path.starts_with("./") || path.starts_with("../") {
        let base = importer
            .filter(|importer| !importer.starts_with('\0'))
            .and_then(|importer| Path::new(importer).parent())
            .unwrap_or(root);
        base.join(path)
    } else {
        return None;
    };
    let candidate = candidate.clean();

    if candidate.extension().is_none() && !candidate.is_file() {
        for extension in TEMPLATE_EXTENSIONS {
            let with_extension = candidate.with_extension(extension);
            if with_extension.is_file() {
                return Some(with_extension);
            }
        }
    }
    Some(candidate)
}

/// Resolution to a module id Rolldown should load and bundle.
pub(crate) fn resolved(id: String) -> HookResolveIdOutput {
    HookResolveIdOutput {
        id: id.into(),
        external: Some(ResolvedExternal::Bool(false)),
        ..Default::default()
    }
}

/// Resolution leaving the specifier to the runtime.
pub(crate) fn external(specifier: String) -> HookResolveIdOutput {
    HookResolveIdOutput {
        id: specifier.into(),
        external: Some(ResolvedExternal::Bool(true)),
        ..Default::default()
    }
}

pub(crate) fn path_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
