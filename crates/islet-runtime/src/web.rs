//! [`Dom`] over the browser DOM via `web-sys`.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CharacterData, Document, Element, Node};

use crate::dom::{Dom, DomError, NodeKind};

/// The live page document.
pub struct WebDom {
    document: Document,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// The document of the current window, if any.
    pub fn current() -> Option<Self> {
        web_sys::window()
            .and_then(|window| window.document())
            .map(Self::new)
    }

    pub fn document(&self) -> Node {
        self.document.clone().into()
    }
}

fn host(err: JsValue) -> DomError {
    DomError::Host(
        err.as_string()
            .unwrap_or_else(|| format!("{err:?}")),
    )
}

impl Dom for WebDom {
    type Node = Node;
    type Listener = js_sys::Function;

    fn node_kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::COMMENT_NODE => NodeKind::Comment,
            Node::DOCUMENT_NODE => NodeKind::Document,
            _ => NodeKind::Text,
        }
    }

    fn comment_data(&self, node: &Node) -> Option<String> {
        if node.node_type() != Node::COMMENT_NODE {
            return None;
        }
        node.dyn_ref::<CharacterData>().map(CharacterData::data)
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>()
            .map(|element| element.tag_name().to_ascii_lowercase())
    }

    fn get_attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<(), DomError> {
        let element = node.dyn_ref::<Element>().ok_or_else(|| {
            DomError::InvalidHierarchy("attributes can only be set on elements".to_string())
        })?;
        element.set_attribute(name, value).map_err(host)
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text_content(&mut self, node: &Node, text: &str) -> Result<(), DomError> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }

    fn first_child(&self, node: &Node) -> Option<Node> {
        node.first_child()
    }

    fn owner_document(&self, node: &Node) -> Node {
        node.owner_document()
            .map(Node::from)
            .unwrap_or_else(|| self.document())
    }

    fn create_element(&mut self, tag: &str) -> Result<Node, DomError> {
        self.document
            .create_element(tag)
            .map(Node::from)
            .map_err(host)
    }

    fn create_text(&mut self, text: &str) -> Node {
        self.document.create_text_node(text).into()
    }

    fn insert_before(
        &mut self,
        parent: &Node,
        new: &Node,
        reference: Option<&Node>,
    ) -> Result<(), DomError> {
        parent.insert_before(new, reference).map(drop).map_err(host)
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) -> Result<(), DomError> {
        parent.remove_child(child).map(drop).map_err(host)
    }

    fn add_event_listener(
        &mut self,
        node: &Node,
        event: &str,
        listener: js_sys::Function,
    ) -> Result<(), DomError> {
        node.add_event_listener_with_callback(event, &listener)
            .map_err(host)
    }
}
