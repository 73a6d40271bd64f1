//! Structural DOM surface shared by the scanner, the virtual container and
//! renderers.

use std::fmt;

/// Node categories the hydration engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
}

impl NodeKind {
    /// Numeric `nodeType` as exposed by browsers.
    pub fn node_type(self) -> u16 {
        match self {
            NodeKind::Element => 1,
            NodeKind::Text => 3,
            NodeKind::Comment => 8,
            NodeKind::Document => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The node is not part of the owned range of a virtual container.
    #[error("node is outside the owned range")]
    NotOwned,

    /// The node is not a child of the given parent.
    #[error("node is not a child of the given parent")]
    NotAChild,

    /// The operation would create a cycle or attach to a leaf node.
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// The owned-node bookkeeping no longer matches the real DOM.
    #[error("owned nodes diverged from the DOM between the boundary markers")]
    InvariantViolated,

    /// Error surfaced by the host DOM implementation.
    #[error("host DOM error: {0}")]
    Host(String),
}

/// The DOM operations the hydration engine relies on.
///
/// Mutating methods take `&mut self`; node handles are cheap clones.
pub trait Dom {
    type Node: Clone + PartialEq + fmt::Debug;
    type Listener;

    fn node_kind(&self, node: &Self::Node) -> NodeKind;

    /// Text of a comment node, `None` for other kinds.
    fn comment_data(&self, node: &Self::Node) -> Option<String>;

    /// Lowercase tag name of an element node.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn get_attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str)
    -> Result<(), DomError>;

    fn text_content(&self, node: &Self::Node) -> String;

    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> Result<(), DomError>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node> {
        self.children(node).into_iter().next()
    }

    fn owner_document(&self, node: &Self::Node) -> Self::Node;

    fn create_element(&mut self, tag: &str) -> Result<Self::Node, DomError>;

    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Insert `new` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. A node that is already attached is moved.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        new: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), DomError>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    fn add_event_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        listener: Self::Listener,
    ) -> Result<(), DomError>;

    /// Elements of the subtree rooted at `root` (inclusive), in document order.
    fn descendant_elements(&self, root: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if self.node_kind(&node) == NodeKind::Element {
                out.push(node.clone());
            }
            let mut children = self.children(&node);
            children.reverse();
            stack.extend(children);
        }
        out
    }
}
