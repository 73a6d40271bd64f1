use super::{
    js_string, CodegenOptions, GeneratedKind, GeneratedModule, UniversalImportRecord,
    MARKERS_SPECIFIER,
};

/// Server-side replacement for a universal component.
///
/// The wrapper renders the real component to a string, optionally inside the
/// configured server wrapper, and hands the markup to the marker helper which
/// embeds it in the marker triple and the instance container. Static
/// properties of the real component are copied onto the wrapper.
pub fn server_wrapper(record: &UniversalImportRecord, options: &CodegenOptions) -> GeneratedModule {
    let (wrapper_import, wrap) = match &options.server_wrapper {
        Some(wrapper) => (
            format!("import ServerWrapper from {};\n", js_string(wrapper)),
            "  element = createElement(ServerWrapper, null, element);\n",
        ),
        None => (String::new(), ""),
    };

    let source = format!(
        r#"import Component from {component};
import {{ {render} as renderToMarkup }} from {renderer};
import {{ createElement, Fragment }} from {element};
import {{ renderInstance }} from {markers};
{wrapper_import}
const COMPONENT_ID = {id};

function IsletUniversal(props) {{
  let element = createElement(Component, props);
{wrap}  const html = renderToMarkup(element);
  return renderInstance(COMPONENT_ID, props, html, {containerless}, {{ createElement, Fragment }});
}}

{STATIC_PROPERTIES}"#,
        component = js_string(&record.original_specifier()),
        render = options.render_function,
        renderer = js_string(&options.server_renderer_module),
        element = js_string(&options.element_module),
        markers = js_string(MARKERS_SPECIFIER),
        id = js_string(&record.generated_id),
        containerless = record.kind.is_containerless(),
    );

    GeneratedModule {
        virtual_path: record.server_virtual_id(),
        source,
        kind: GeneratedKind::ServerWrapper,
    }
}

const STATIC_PROPERTIES: &str = r#"for (const key of Object.keys(Component)) {
  if (!(key in IsletUniversal)) IsletUniversal[key] = Component[key];
}
IsletUniversal.displayName = `Universal(${Component.displayName || Component.name || COMPONENT_ID})`;

export default IsletUniversal;
"#;
