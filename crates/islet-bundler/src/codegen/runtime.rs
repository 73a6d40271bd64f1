use islet_runtime::markers::{END_MARKER, PROPS_KIND_KEY, ROOT_ATTRIBUTE, START_MARKER};

use super::{js_string, runtime_virtual_id, CodegenOptions, GeneratedKind, GeneratedModule};

/// Browser runtime imported by client entries when `runtime_module` is left
/// at `islet:runtime`.
///
/// A JavaScript rendition of [`islet_runtime`]: the same left-to-right marker
/// scan with per-instance recovery, a lazily built per-page instance table
/// and a `VirtualContainer` class that a rendering library mounts into as if
/// it were an element. Hydration is delegated to the configured client
/// renderer, called as `hydrate(container, element)`.
pub fn runtime_module(options: &CodegenOptions) -> GeneratedModule {
    let source = format!(
        r#"import {{ {hydrate} as hydrateTree }} from {renderer};

const START_MARKER = {start};
const END_MARKER = {end};
const ROOT_ATTRIBUTE = {root};
const PROPS_KIND = {kind};

{RUNTIME_FUNCTIONS}"#,
        hydrate = options.hydrate_function,
        renderer = js_string(&options.client_renderer_module),
        start = js_string(START_MARKER),
        end = js_string(END_MARKER),
        root = js_string(ROOT_ATTRIBUTE),
        kind = js_string(PROPS_KIND_KEY),
    );

    GeneratedModule {
        virtual_path: runtime_virtual_id(),
        source,
        kind: GeneratedKind::Runtime,
    }
}

const RUNTIME_FUNCTIONS: &str = r##"const ELEMENT_NODE = 1;
const COMMENT_NODE = 8;

export class HydrationError extends Error {
  constructor(kind, message, { componentName = null, position = null, payload = null } = {}) {
    super(message);
    this.name = "HydrationError";
    this.kind = kind;
    this.componentName = componentName;
    this.position = position;
    this.payload = payload;
  }
}

function attributed(componentName) {
  return componentName ? ` of \`${componentName}\`` : "";
}

function markerOf(node) {
  return node && node.nodeType === COMMENT_NODE ? node.data.trim() : null;
}

function componentNameHint(payload) {
  const match = /"componentName"\s*:\s*("(?:[^"\\]|\\.)*")/.exec(payload);
  if (!match) return null;
  try {
    return JSON.parse(match[1]);
  } catch {
    return null;
  }
}

function decodeInfo(payload) {
  const info = JSON.parse(payload);
  if (info === null || typeof info !== "object" || typeof info.componentName !== "string") {
    throw new Error("missing componentName");
  }
  return { componentName: info.componentName, props: info.props ?? null };
}

// index just past the end marker of the instance whose payload was rejected
function skipInstance(siblings, index) {
  let depth = 0;
  while (index < siblings.length) {
    const marker = markerOf(siblings[index++]);
    if (marker === START_MARKER) depth++;
    else if (marker === END_MARKER && depth === 0) return index;
    else if (marker === END_MARKER) depth--;
  }
  return index;
}

function scanList(siblings) {
  const records = [];
  const errors = [];
  let index = 0;

  while (index < siblings.length) {
    const position = index;
    const startNode = siblings[index++];
    if (markerOf(startNode) !== START_MARKER) continue;

    if (index >= siblings.length) {
      errors.push(
        new HydrationError("unterminated", `unterminated instance opened at sibling ${position}`, {
          position,
        }),
      );
      break;
    }

    const payload = markerOf(siblings[index]);
    let info = null;
    let failure = null;
    if (payload === null) {
      failure = "expected an info comment after the start marker";
    } else {
      try {
        info = decodeInfo(payload);
      } catch (error) {
        failure = error.message;
      }
    }
    if (failure !== null) {
      const componentName = payload === null ? null : componentNameHint(payload);
      errors.push(
        new HydrationError(
          "malformed-payload",
          `malformed marker payload${attributed(componentName)} at sibling ${position}: ${failure}`,
          { componentName, position, payload: payload ?? siblings[index].textContent },
        ),
      );
      index = skipInstance(siblings, index);
      continue;
    }
    index++;

    const nodes = [];
    let depth = 0;
    let endNode = null;
    while (index < siblings.length) {
      const node = siblings[index++];
      const marker = markerOf(node);
      if (marker === END_MARKER && depth === 0) {
        endNode = node;
        break;
      }
      if (marker === END_MARKER) depth--;
      else if (marker === START_MARKER) depth++;
      nodes.push(node);
    }
    if (endNode === null) {
      errors.push(
        new HydrationError(
          "unterminated",
          `unterminated instance${attributed(info.componentName)} opened at sibling ${position}`,
          { componentName: info.componentName, position },
        ),
      );
      break;
    }
    records.push({ info, startNode, endNode, nodes });
  }

  return { records, errors };
}

// Strictly scan the children of `parent`; the first error is thrown.
export function scanSiblings(parent) {
  const { records, errors } = scanList(Array.from(parent.childNodes));
  if (errors.length > 0) throw errors[0];
  return records;
}

function rootElements(root) {
  const found = [];
  const pending = [root];
  while (pending.length > 0) {
    const node = pending.pop();
    if (node.nodeType === ELEMENT_NODE && node.hasAttribute(ROOT_ATTRIBUTE)) found.push(node);
    const children = Array.from(node.childNodes);
    for (let i = children.length - 1; i >= 0; i--) pending.push(children[i]);
  }
  return found;
}

function ownedByAny(node, records) {
  for (let current = node.parentNode; current; current = current.parentNode) {
    if (records.some((record) => record.nodes.includes(current))) return true;
  }
  return false;
}

// Scan every retrieval root under `root`, skipping roots that belong to the
// content of an instance found earlier.
export function scanSubtree(root) {
  const records = [];
  const errors = [];
  for (const element of rootElements(root)) {
    if (ownedByAny(element, records)) continue;
    const scanned = scanList(Array.from(element.childNodes));
    records.push(...scanned.records);
    errors.push(...scanned.errors);
  }
  return { records, errors };
}

let table = null;

function instanceTable() {
  if (table === null) {
    const { records, errors } = scanSubtree(document);
    const byName = new Map();
    for (const record of records) {
      const name = record.info.componentName;
      if (!byName.has(name)) byName.set(name, []);
      byName.get(name).push(record);
    }
    for (const error of errors) {
      console.warn(`islet: skipping corrupt component instance: ${error.message}`);
    }
    table = { byName, errors };
  }
  return table;
}

// Instances of `componentName` in document order. The page is scanned once,
// on the first lookup.
export function lookupInstances(componentName) {
  return (instanceTable().byName.get(componentName) ?? []).slice();
}

// Instances that could not be reconstructed.
export function instanceErrors() {
  return instanceTable().errors.slice();
}

function containerError(message) {
  return new HydrationError("dom", message);
}

function forget(nodes, child) {
  const index = nodes.indexOf(child);
  if (index !== -1) nodes.splice(index, 1);
}

export class VirtualContainer {
  constructor(nodes, startNode, endNode) {
    const parent = endNode.parentNode;
    if (!parent || startNode.parentNode !== parent) {
      throw containerError("boundary markers must share a parent");
    }
    this.parentNode = parent;
    this.startNode = startNode;
    this.endNode = endNode;
    this.childNodes = Array.from(nodes);
  }

  get nodeType() {
    return ELEMENT_NODE;
  }

  get firstChild() {
    return this.childNodes[0] ?? null;
  }

  get lastChild() {
    return this.childNodes[this.childNodes.length - 1] ?? null;
  }

  get ownerDocument() {
    return this.parentNode.ownerDocument;
  }

  contains(node) {
    return this.childNodes.includes(node);
  }

  appendChild(child) {
    this.guardBoundary(child);
    this.parentNode.insertBefore(child, this.endNode);
    forget(this.childNodes, child);
    this.childNodes.push(child);
    return child;
  }

  insertBefore(child, reference) {
    if (reference == null) return this.appendChild(child);
    this.guardBoundary(child);
    if (!this.contains(reference)) throw containerError("node is outside the owned range");
    this.parentNode.insertBefore(child, reference);
    forget(this.childNodes, child);
    this.childNodes.splice(this.childNodes.indexOf(reference), 0, child);
    return child;
  }

  removeChild(child) {
    if (!this.contains(child)) throw containerError("node is outside the owned range");
    this.parentNode.removeChild(child);
    forget(this.childNodes, child);
    return child;
  }

  addEventListener(type, listener, options) {
    this.parentNode.addEventListener(type, listener, options);
  }

  removeEventListener(type, listener, options) {
    this.parentNode.removeEventListener(type, listener, options);
  }

  // Does the owned list equal the real siblings between the info comment and
  // the end marker?
  checkInvariant() {
    const info = this.startNode.nextSibling;
    if (!info || info === this.endNode) return false;
    let index = 0;
    for (let node = info.nextSibling; node; node = node.nextSibling) {
      if (node === this.endNode) return index === this.childNodes.length;
      if (this.childNodes[index++] !== node) return false;
    }
    return false;
  }

  guardBoundary(child) {
    if (child === this.startNode || child === this.endNode) {
      throw containerError("boundary markers cannot be moved");
    }
  }
}

export function createVirtualContainer({ nodes, startNode, endNode }) {
  return new VirtualContainer(nodes, startNode, endNode);
}

function reviveChild(value, createElement) {
  if (Array.isArray(value)) return value.map((item) => reviveChild(item, createElement));
  if (value === null || typeof value !== "object") return value;
  switch (value[PROPS_KIND]) {
    case "element":
      return createElement(value.type, reviveProps(value.props, createElement));
    case "opaque":
      return null;
    default:
      return value;
  }
}

// Turn the serialized `children` of an info payload back into elements.
// Children the server could not serialize come back as `null`.
export function reviveProps(props, createElement) {
  if (props === null || typeof props !== "object" || !("children" in props)) return props;
  return { ...props, children: reviveChild(props.children, createElement) };
}

export function hydrateInstance(instance, element) {
  const container = createVirtualContainer(instance);
  const root = hydrateTree(container, element);
  return { info: instance.info, container, root };
}

// Re-render a hydrated instance and verify its boundaries held.
export function updateInstance(hydrated, element) {
  hydrated.root.render(element);
  if (!hydrated.container.checkInvariant()) {
    const { componentName } = hydrated.info;
    throw new HydrationError(
      "dom",
      `owned nodes of \`${componentName}\` diverged from the DOM between the boundary markers`,
      { componentName },
    );
  }
  return hydrated;
}
"##;

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CodegenOptions {
        CodegenOptions::default()
    }

    #[test]
    fn runtime_is_built_from_marker_constants() {
        let module = runtime_module(&options());
        assert_eq!(module.kind, GeneratedKind::Runtime);
        assert_eq!(module.virtual_path, "\0islet:runtime");
        assert!(module.source.contains(r#"const START_MARKER = "start";"#));
        assert!(module.source.contains(r#"const END_MARKER = "end";"#));
        assert!(module.source.contains(r#"const ROOT_ATTRIBUTE = "data-islet-root";"#));
        assert!(module.source.contains(r#"const PROPS_KIND = "$islet";"#));
    }

    #[test]
    fn exports_the_client_entry_contract() {
        let source = runtime_module(&options()).source;
        for export in [
            "export function lookupInstances(",
            "export function hydrateInstance(",
            "export function reviveProps(",
            "export function updateInstance(",
            "export function createVirtualContainer(",
            "export class VirtualContainer",
        ] {
            assert!(source.contains(export), "missing `{export}`");
        }
    }

    #[test]
    fn hydration_goes_through_the_configured_client_renderer() {
        let default = runtime_module(&options()).source;
        assert!(default
            .starts_with(r#"import { hydrateRoot as hydrateTree } from "react-dom/client";"#));

        let custom = CodegenOptions {
            client_renderer_module: "/app/lib/client.js".to_string(),
            hydrate_function: "hydrate".to_string(),
            ..options()
        };
        let source = runtime_module(&custom).source;
        assert!(source
            .starts_with(r#"import { hydrate as hydrateTree } from "/app/lib/client.js";"#));
        assert!(source.contains("const root = hydrateTree(container, element);"));
    }

    #[test]
    fn container_presents_itself_as_an_element() {
        let source = runtime_module(&options()).source;
        assert!(source.contains("get nodeType() {\n    return ELEMENT_NODE;"));
        assert!(source.contains("this.parentNode.insertBefore(child, this.endNode);"));
        assert!(source.contains("this.parentNode.addEventListener(type, listener, options);"));
    }
}
