//! Configuration sections: build layout, universal components, template rendering.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_public_path() -> String {
    "/".to_string()
}

fn default_renderers() -> IndexMap<String, String> {
    let mut renderers = IndexMap::new();
    renderers.insert("html".to_string(), "@islet/render-html".to_string());
    renderers
}

fn default_runtime_module() -> String {
    "islet:runtime".to_string()
}

fn default_client_renderer_module() -> String {
    "react-dom/client".to_string()
}

fn default_hydrate_function() -> String {
    "hydrateRoot".to_string()
}

fn default_server_renderer_module() -> String {
    "react-dom/server".to_string()
}

fn default_render_function() -> String {
    "renderToString".to_string()
}

fn default_element_module() -> String {
    "react".to_string()
}

fn default_manifest_filename() -> String {
    "islet-manifest.json".to_string()
}

fn default_node_binary() -> String {
    "node".to_string()
}

fn default_true() -> bool {
    true
}

/// Where sources live and where output goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Root of the page/template tree scanned for entries.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Output directory shared by the server and client compilations.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// URL prefix under which `out_dir` is served.
    #[serde(default = "default_public_path")]
    pub public_path: String,

    /// Template type suffix → rendering-function module.
    ///
    /// A file `about.html.js` is a template only when `html` is registered here.
    #[serde(default = "default_renderers")]
    pub renderers: IndexMap<String, String>,

    /// Minify client bundles.
    #[serde(default)]
    pub minify: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            out_dir: default_out_dir(),
            public_path: default_public_path(),
            renderers: default_renderers(),
            minify: false,
        }
    }
}

/// Code generation settings for universal components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalSection {
    /// Module exporting `lookupInstances` and `hydrateInstance`.
    ///
    /// The default, `islet:runtime`, is generated by the build and served to
    /// the client compilation from memory.
    #[serde(default = "default_runtime_module")]
    pub runtime_module: String,

    /// Module exporting the client hydration function used by the generated
    /// runtime.
    #[serde(default = "default_client_renderer_module")]
    pub client_renderer_module: String,

    /// Name of the hydration export of `client_renderer_module`, called as
    /// `hydrate(container, element)`.
    #[serde(default = "default_hydrate_function")]
    pub hydrate_function: String,

    /// Module exporting the server string renderer.
    #[serde(default = "default_server_renderer_module")]
    pub server_renderer_module: String,

    /// Name of the string-rendering export of `server_renderer_module`.
    #[serde(default = "default_render_function")]
    pub render_function: String,

    /// Module exporting `createElement`.
    #[serde(default = "default_element_module")]
    pub element_module: String,

    /// Optional component wrapping every universal component during server rendering.
    #[serde(default)]
    pub server_wrapper: Option<PathBuf>,

    /// Client counterpart of `server_wrapper`. Both or neither must be set.
    #[serde(default)]
    pub client_wrapper: Option<PathBuf>,

    /// Filename of the chunk manifest artifact.
    #[serde(default = "default_manifest_filename")]
    pub manifest_filename: String,

    /// Emit `import.meta.hot` re-hydration code in client entries.
    #[serde(default = "default_true")]
    pub hot_reload: bool,
}

impl Default for UniversalSection {
    fn default() -> Self {
        Self {
            runtime_module: default_runtime_module(),
            client_renderer_module: default_client_renderer_module(),
            hydrate_function: default_hydrate_function(),
            server_renderer_module: default_server_renderer_module(),
            render_function: default_render_function(),
            element_module: default_element_module(),
            server_wrapper: None,
            client_wrapper: None,
            manifest_filename: default_manifest_filename(),
            hot_reload: true,
        }
    }
}

/// How compiled templates are turned into static output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// One child process per template; a crash only fails that template.
    #[default]
    Isolated,
    /// One child process renders every template.
    Batched,
    /// Skip static rendering (server modules are still emitted).
    Off,
}

/// Static template rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSection {
    #[serde(default)]
    pub mode: RenderMode,

    /// JavaScript runtime used for render processes.
    #[serde(default = "default_node_binary")]
    pub node_binary: String,

    /// Stop rendering at the first failing template.
    #[serde(default)]
    pub abort_on_first_error: bool,

    /// Kill a render process after this many milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            node_binary: default_node_binary(),
            abort_on_first_error: false,
            timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_defaults_register_html() {
        let build = BuildSection::default();
        assert_eq!(build.source_dir, PathBuf::from("src"));
        assert_eq!(build.out_dir, PathBuf::from("dist"));
        assert!(build.renderers.contains_key("html"));
    }

    #[test]
    fn runtime_defaults_to_the_generated_module() {
        assert_eq!(UniversalSection::default().runtime_module, "islet:runtime");
    }

    #[test]
    fn render_mode_parses_lowercase() {
        let mode: RenderMode = serde_json::from_str("\"batched\"").unwrap();
        assert_eq!(mode, RenderMode::Batched);
    }

    #[test]
    fn partial_universal_section_keeps_defaults() {
        let section: UniversalSection =
            serde_json::from_str(r#"{ "runtime_module": "./runtime.js" }"#).unwrap();
        assert_eq!(section.runtime_module, "./runtime.js");
        assert_eq!(section.render_function, "renderToString");
        assert_eq!(section.client_renderer_module, "react-dom/client");
        assert_eq!(section.hydrate_function, "hydrateRoot");
        assert!(section.hot_reload);
    }
}
