use super::{js_string, CodegenOptions, GeneratedKind, GeneratedModule, UniversalImportRecord};

/// Browser entry that hydrates every instance of one universal component.
///
/// At evaluation time the entry asks the runtime for all instances recorded
/// under the component id and hydrates each of them; a page without instances
/// does nothing. An instance that fails to hydrate is reported on the console
/// and the others still hydrate. With hot reload enabled, accepting a new
/// version of the component re-hydrates every instance in place from its
/// current nodes and boundary comments.
pub fn client_entry(record: &UniversalImportRecord, options: &CodegenOptions) -> GeneratedModule {
    let component = js_string(&record.original_specifier());
    let (wrapper_import, wrap) = match &options.client_wrapper {
        Some(wrapper) => (
            format!("import ClientWrapper from {};\n", js_string(wrapper)),
            "  element = createElement(ClientWrapper, null, element);\n",
        ),
        None => (String::new(), ""),
    };

    let mut source = format!(
        r#"import Component from {component};
import {{ createElement }} from {element};
import {{ lookupInstances, hydrateInstance, reviveProps }} from {runtime};
{wrapper_import}
const COMPONENT_ID = {id};

function render(Target, props) {{
  let element = createElement(Target, reviveProps(props, createElement));
{wrap}  return element;
}}

function hydrate(instance, Target) {{
  try {{
    return hydrateInstance(instance, render(Target, instance.info.props));
  }} catch (error) {{
    console.error(`islet: failed to hydrate ${{COMPONENT_ID}}`, error);
    return null;
  }}
}}

const instances = lookupInstances(COMPONENT_ID)
  .map((instance) => hydrate(instance, Component))
  .filter(Boolean);
"#,
        element = js_string(&options.element_module),
        runtime = js_string(&options.runtime_module),
        id = js_string(&record.generated_id),
    );

    if options.hot_reload {
        source.push_str(&format!(
            r#"
if (import.meta.hot) {{
  import.meta.hot.accept({component}, (next) => {{
    if (!next) return;
    instances.forEach((current, index) => {{
      const {{ container, info }} = current;
      const {{ childNodes: nodes, startNode, endNode }} = container;
      instances[index] = hydrate({{ nodes, startNode, endNode, info }}, next.default) ?? current;
    }});
  }});
}}
"#
        ));
    }

    source.push_str("\nexport default instances;\n");

    GeneratedModule {
        virtual_path: record.client_virtual_id(),
        source,
        kind: GeneratedKind::ClientEntry,
    }
}
