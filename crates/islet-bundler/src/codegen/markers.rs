use islet_runtime::markers::{
    strip_script, CONTAINER_TAG, END_MARKER, PROPS_KIND_KEY, ROOT_ATTRIBUTE, START_MARKER,
    STRIP_TAG,
};

use super::{js_string, markers_virtual_id, GeneratedKind, GeneratedModule};

/// Shared helper imported by every server wrapper.
///
/// Implements the same marker format as [`islet_runtime::markers`]; the
/// constants are spliced in from there. Rendered component ids are recorded
/// in a process-wide set so the page renderer knows which client entries a
/// template needs.
///
/// `children` travel in the info payload: text and elements with a tag name
/// are encoded structurally, anything else (component elements, render
/// functions) as an opaque placeholder the client runtime turns into `null`.
pub fn marker_helper_module() -> GeneratedModule {
    let source = format!(
        r#"const START_MARKER = {start};
const END_MARKER = {end};
const ROOT_ATTRIBUTE = {root};
const CONTAINER_TAG = {container};
const STRIP_TAG = {strip};
const STRIP_SCRIPT = {script};
const PROPS_KIND = {kind};
const USED = Symbol.for("islet.usedComponents");

{MARKER_FUNCTIONS}"#,
        start = js_string(START_MARKER),
        end = js_string(END_MARKER),
        root = js_string(ROOT_ATTRIBUTE),
        container = js_string(CONTAINER_TAG),
        strip = js_string(STRIP_TAG),
        script = js_string(&strip_script()),
        kind = js_string(PROPS_KIND_KEY),
    );

    GeneratedModule {
        virtual_path: markers_virtual_id(),
        source,
        kind: GeneratedKind::MarkerHelper,
    }
}

const MARKER_FUNCTIONS: &str = r#"export function escapeJson(value) {
  return JSON.stringify(value === undefined ? null : value)
    .replace(/</g, "\\u003c")
    .replace(/>/g, "\\u003e");
}

export function embed(componentName, props, content) {
  const info = escapeJson({ componentName, props });
  return `<!--${START_MARKER}--><!--${info}-->${content}<!--${END_MARKER}-->`;
}

export function recordUsage(componentName) {
  (globalThis[USED] ??= new Set()).add(componentName);
}

export function usedComponents() {
  return Array.from(globalThis[USED] ?? []);
}

export function resetUsage() {
  globalThis[USED] = new Set();
}

function serializeChild(child) {
  if (typeof child === "function") return { [PROPS_KIND]: "opaque" };
  if (child === null || typeof child !== "object") return child ?? null;
  if (Array.isArray(child)) return child.map(serializeChild);
  if ("type" in child && "props" in child) {
    return typeof child.type === "string"
      ? { [PROPS_KIND]: "element", type: child.type, props: serializableProps(child.props) }
      : { [PROPS_KIND]: "opaque" };
  }
  return child;
}

export function serializableProps(props) {
  const { children, ...rest } = props ?? {};
  return children === undefined ? rest : { ...rest, children: serializeChild(children) };
}

export function renderInstance(
  componentName,
  props,
  html,
  containerless,
  { createElement, Fragment },
) {
  recordUsage(componentName);
  const markup = embed(componentName, serializableProps(props), html);
  if (containerless) {
    return createElement(
      Fragment,
      null,
      createElement(STRIP_TAG, { dangerouslySetInnerHTML: { __html: markup } }),
      createElement("script", { dangerouslySetInnerHTML: { __html: STRIP_SCRIPT } }),
    );
  }
  return createElement(CONTAINER_TAG, {
    [ROOT_ATTRIBUTE]: "",
    dangerouslySetInnerHTML: { __html: markup },
  });
}
"#;
