//! Code generation for universal components.
//!
//! Every universal import produces two virtual modules:
//!
//! - a **server wrapper** that replaces the component in the server build and
//!   renders it inside the marker triple, and
//! - a **client entry** compiled by the nested browser build, which finds those
//!   triples on the page and hydrates them.
//!
//! Both reach the real component through the escape hatch
//! (`<path>?islet-original`) so they are never wrapped a second time. A third
//! module, the marker helper, is shared by all server wrappers, and unless a
//! custom `runtime_module` is configured the client entries share a generated
//! browser runtime.

mod client;
mod markers;
mod runtime;
mod server;

use std::path::{Path, PathBuf};

use islet_config::UniversalSection;
use serde_json::Value;

use crate::tagger::WrapperKind;

pub use client::client_entry;
pub use markers::marker_helper_module;
pub use runtime::runtime_module;
pub use server::server_wrapper;

/// Prefix Rolldown reserves for ids that do not exist on disk.
const VIRTUAL_PREFIX: &str = "\0";

/// Public specifier of the marker helper module.
pub const MARKERS_SPECIFIER: &str = "islet:markers";

/// Public specifier of the generated browser runtime.
pub const RUNTIME_SPECIFIER: &str = "islet:runtime";

const SERVER_NAMESPACE: &str = "islet:server:";
const CLIENT_NAMESPACE: &str = "islet:client:";
const CONTAINERLESS_SUFFIX: &str = ":containerless";

/// Identifier of a universal component, derived from its project-relative path.
///
/// Path separators and dots become `_`, so `components/Clock.js` is
/// `components_Clock_js`. Distinct paths can map to the same id
/// (`a_b.js` and `a/b.js`); [`crate::BuildContext`] rejects such pairs.
pub fn generated_id(relative_path: &str) -> String {
    relative_path
        .replace('\\', "/")
        .chars()
        .map(|c| if c == '/' || c == '.' { '_' } else { c })
        .collect()
}

/// Resolved id of the server wrapper for `id`.
pub fn server_virtual_id(id: &str, kind: WrapperKind) -> String {
    let suffix = if kind.is_containerless() {
        CONTAINERLESS_SUFFIX
    } else {
        ""
    };
    format!("{VIRTUAL_PREFIX}{SERVER_NAMESPACE}{id}{suffix}")
}

/// Import specifier of the client entry for `id`.
pub fn client_specifier(id: &str) -> String {
    format!("{CLIENT_NAMESPACE}{id}")
}

/// Resolved id of the client entry for `id`.
pub fn client_virtual_id(id: &str) -> String {
    format!("{VIRTUAL_PREFIX}{CLIENT_NAMESPACE}{id}")
}

/// Resolved id of the marker helper module.
pub fn markers_virtual_id() -> String {
    format!("{VIRTUAL_PREFIX}{MARKERS_SPECIFIER}")
}

/// Resolved id of the generated browser runtime.
pub fn runtime_virtual_id() -> String {
    format!("{VIRTUAL_PREFIX}{RUNTIME_SPECIFIER}")
}

/// Component id addressed by a client entry specifier (`islet:client:<id>`),
/// with or without the virtual prefix.
pub fn parse_client_specifier(specifier: &str) -> Option<&str> {
    specifier
        .strip_prefix(VIRTUAL_PREFIX)
        .unwrap_or(specifier)
        .strip_prefix(CLIENT_NAMESPACE)
        .filter(|id| !id.is_empty())
}

/// One universal import seen during the server build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniversalImportRecord {
    /// Absolute path of the real component module.
    pub source_path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub relative_path: String,
    pub generated_id: String,
    pub kind: WrapperKind,
}

impl UniversalImportRecord {
    pub fn new(source_path: impl Into<PathBuf>, root: &Path, kind: WrapperKind) -> Self {
        let source_path = source_path.into();
        let relative_path = source_path
            .strip_prefix(root)
            .unwrap_or(&source_path)
            .to_string_lossy()
            .replace('\\', "/");
        let generated_id = generated_id(relative_path.trim_start_matches('/'));
        Self {
            source_path,
            relative_path,
            generated_id,
            kind,
        }
    }

    /// Specifier importing the unwrapped component.
    pub fn original_specifier(&self) -> String {
        crate::tagger::escape_specifier(&module_path(&self.source_path))
    }

    pub fn server_virtual_id(&self) -> String {
        server_virtual_id(&self.generated_id, self.kind)
    }

    pub fn client_virtual_id(&self) -> String {
        client_virtual_id(&self.generated_id)
    }
}

/// Module specifiers and switches baked into the generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    pub runtime_module: String,
    pub client_renderer_module: String,
    pub hydrate_function: String,
    pub server_renderer_module: String,
    pub render_function: String,
    pub element_module: String,
    pub server_wrapper: Option<String>,
    pub client_wrapper: Option<String>,
    pub hot_reload: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self::from_config(&UniversalSection::default(), Path::new("/"))
    }
}

impl CodegenOptions {
    /// Relative module specifiers in the config are resolved against `root`;
    /// package names are kept as they are.
    pub fn from_config(section: &UniversalSection, root: &Path) -> Self {
        let module = |specifier: &str| {
            if specifier.starts_with("./") || specifier.starts_with("../") {
                module_path(&path_clean::clean(root.join(specifier)))
            } else {
                specifier.to_string()
            }
        };
        let wrapper = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| module_path(&path_clean::clean(root.join(p))))
        };

        Self {
            runtime_module: module(&section.runtime_module),
            client_renderer_module: module(&section.client_renderer_module),
            hydrate_function: section.hydrate_function.clone(),
            server_renderer_module: module(&section.server_renderer_module),
            render_function: section.render_function.clone(),
            element_module: module(&section.element_module),
            server_wrapper: wrapper(&section.server_wrapper),
            client_wrapper: wrapper(&section.client_wrapper),
            hot_reload: section.hot_reload,
        }
    }

    /// Client entries import the generated runtime rather than a package.
    pub fn uses_generated_runtime(&self) -> bool {
        self.runtime_module == RUNTIME_SPECIFIER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKind {
    ServerWrapper,
    ClientEntry,
    MarkerHelper,
    Runtime,
}

/// Synthesized module source served to Rolldown from memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub virtual_path: String,
    pub source: String,
    pub kind: GeneratedKind,
}

/// A JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Import specifier for a file path.
pub(crate) fn module_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_replace_separators_and_dots() {
        assert_eq!(generated_id("components/Clock.js"), "components_Clock_js");
        assert_eq!(generated_id("components\\Clock.js"), "components_Clock_js");
        assert_eq!(generated_id("a/b/c.universal.tsx"), "a_b_c_universal_tsx");
    }

    #[test]
    fn ids_are_deterministic() {
        let record = || {
            UniversalImportRecord::new("/app/src/Clock.js", Path::new("/app"), WrapperKind::Universal)
        };
        let first = record();
        let second = record();
        assert_eq!(first.generated_id, "src_Clock_js");
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_paths_can_share_an_id() {
        assert_eq!(generated_id("a_b.js"), generated_id("a/b.js"));
    }

    #[test]
    fn virtual_ids_keep_kinds_apart() {
        assert_eq!(
            server_virtual_id("x", WrapperKind::Universal),
            "\0islet:server:x"
        );
        assert_eq!(
            server_virtual_id("x", WrapperKind::ContainerlessUniversal),
            "\0islet:server:x:containerless"
        );
        assert_eq!(parse_client_specifier("islet:client:x"), Some("x"));
        assert_eq!(parse_client_specifier(&client_virtual_id("x")), Some("x"));
        assert_eq!(parse_client_specifier("islet:client:"), None);
        assert_eq!(parse_client_specifier("./x.js"), None);
        assert_eq!(parse_client_specifier(RUNTIME_SPECIFIER), None);
        assert_eq!(runtime_virtual_id(), "\0islet:runtime");
    }

    #[test]
    fn relative_config_modules_are_anchored_at_the_root() {
        let section = UniversalSection {
            runtime_module: "./lib/runtime.js".to_string(),
            server_wrapper: Some(PathBuf::from("wrappers/Server.js")),
            ..Default::default()
        };
        let options = CodegenOptions::from_config(&section, Path::new("/app"));
        assert_eq!(options.runtime_module, "/app/lib/runtime.js");
        assert!(!options.uses_generated_runtime());
        assert_eq!(options.element_module, "react");
        assert_eq!(options.server_wrapper.as_deref(), Some("/app/wrappers/Server.js"));
    }

    #[test]
    fn generated_runtime_is_the_default() {
        let options = CodegenOptions::default();
        assert_eq!(options.runtime_module, "islet:runtime");
        assert!(options.uses_generated_runtime());
        assert_eq!(options.client_renderer_module, "react-dom/client");

        let section = UniversalSection {
            client_renderer_module: "./lib/client.js".to_string(),
            ..Default::default()
        };
        let options = CodegenOptions::from_config(&section, Path::new("/app"));
        assert_eq!(options.client_renderer_module, "/app/lib/client.js");
    }

    #[test]
    fn js_strings_are_escaped() {
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
    }
}
