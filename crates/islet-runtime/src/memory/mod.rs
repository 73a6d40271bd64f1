//! In-memory DOM used by tests, server-side tooling and the end-to-end checks
//! of the marker protocol.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Detached nodes stay
//! in the arena; they simply have no parent.

mod parse;
mod serialize;

use crate::dom::{Dom, DomError, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Opaque listener handle registered through [`Dom::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<NodeEntry>,
    listeners: Vec<(NodeId, String, ListenerId)>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeEntry {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            listeners: Vec::new(),
        }
    }

    /// Parse an HTML fragment into a fresh document.
    pub fn parse(html: &str) -> Self {
        let mut dom = Self::new();
        let document = dom.document();
        dom.append_html(document, html);
        dom
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    /// Parse `html` and append the resulting nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        parse::parse_into(self, parent, html)
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        serialize::inner_html(self, node)
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        serialize::outer_html(self, node)
    }

    /// Elements with the given tag name under `root`, in document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendant_elements(&root)
            .into_iter()
            .filter(|node| self.tag_name(node).as_deref() == Some(tag))
            .collect()
    }

    /// Listeners registered on `node`.
    pub fn listeners(&self, node: NodeId) -> Vec<(&str, ListenerId)> {
        self.listeners
            .iter()
            .filter(|(target, _, _)| *target == node)
            .map(|(_, event, id)| (event.as_str(), *id))
            .collect()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(NodeEntry {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn entry(&self, node: NodeId) -> &NodeEntry {
        &self.nodes[node.0]
    }

    fn entry_mut(&mut self, node: NodeId) -> &mut NodeEntry {
        &mut self.nodes[node.0]
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.entry_mut(node).parent.take() {
            self.entry_mut(parent).children.retain(|child| *child != node);
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.entry(id).parent;
        }
        false
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.alloc(data);
        self.entry_mut(id).parent = Some(parent);
        self.entry_mut(parent).children.push(id);
        id
    }

    pub(crate) fn data(&self, node: NodeId) -> &NodeData {
        &self.entry(node).data
    }

    pub(crate) fn child_ids(&self, node: NodeId) -> &[NodeId] {
        &self.entry(node).children
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;
    type Listener = ListenerId;

    fn node_kind(&self, node: &NodeId) -> NodeKind {
        match self.entry(*node).data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
        }
    }

    fn comment_data(&self, node: &NodeId) -> Option<String> {
        match &self.entry(*node).data {
            NodeData::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.entry(*node).data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn get_attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.entry(*node).data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone()),
            _ => None,
        }
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.entry_mut(*node).data {
            NodeData::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(key, _)| key == name) {
                    Some((_, existing)) => *existing = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            _ => Err(DomError::InvalidHierarchy(
                "attributes can only be set on elements".to_string(),
            )),
        }
    }

    fn text_content(&self, node: &NodeId) -> String {
        match &self.entry(*node).data {
            NodeData::Text(text) | NodeData::Comment(text) => text.clone(),
            NodeData::Element { .. } | NodeData::Document => self
                .child_ids(*node)
                .iter()
                .filter(|child| !matches!(self.data(**child), NodeData::Comment(_)))
                .map(|child| self.text_content(child))
                .collect(),
        }
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.entry_mut(*node).data {
            NodeData::Text(existing) | NodeData::Comment(existing) => {
                *existing = text.to_string();
                return Ok(());
            }
            NodeData::Document => {
                return Err(DomError::InvalidHierarchy(
                    "cannot replace the document's content".to_string(),
                ));
            }
            NodeData::Element { .. } => {}
        }

        for child in self.child_ids(*node).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            self.push_child(*node, NodeData::Text(text.to_string()));
        }
        Ok(())
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.entry(*node).parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.child_ids(*node).to_vec()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.entry(*node).parent?;
        let siblings = self.child_ids(parent);
        let index = siblings.iter().position(|child| child == node)?;
        siblings.get(index + 1).copied()
    }

    fn owner_document(&self, _node: &NodeId) -> NodeId {
        self.document()
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(DomError::InvalidHierarchy(format!("invalid tag name `{tag}`")));
        }
        Ok(self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        new: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), DomError> {
        if !matches!(
            self.entry(*parent).data,
            NodeData::Element { .. } | NodeData::Document
        ) {
            return Err(DomError::InvalidHierarchy(
                "only elements and documents have children".to_string(),
            ));
        }
        if matches!(self.entry(*new).data, NodeData::Document) {
            return Err(DomError::InvalidHierarchy(
                "a document cannot be inserted".to_string(),
            ));
        }
        if self.is_ancestor_or_self(*new, *parent) {
            return Err(DomError::InvalidHierarchy(
                "a node cannot be inserted into itself".to_string(),
            ));
        }
        if let Some(reference) = reference {
            if self.entry(*reference).parent != Some(*parent) {
                return Err(DomError::NotAChild);
            }
            if reference == new {
                return Ok(());
            }
        }

        self.detach(*new);
        let index = match reference {
            Some(reference) => self
                .child_ids(*parent)
                .iter()
                .position(|child| child == reference)
                .ok_or(DomError::NotAChild)?,
            None => self.child_ids(*parent).len(),
        };
        self.entry_mut(*parent).children.insert(index, *new);
        self.entry_mut(*new).parent = Some(*parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), DomError> {
        if self.entry(*child).parent != Some(*parent) {
            return Err(DomError::NotAChild);
        }
        self.detach(*child);
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: &NodeId,
        event: &str,
        listener: ListenerId,
    ) -> Result<(), DomError> {
        self.listeners.push((*node, event.to_string(), listener));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_attached_nodes() {
        let mut dom = MemoryDom::parse("<ul><li>a</li><li>b</li><li>c</li></ul>");
        let list = dom.elements_by_tag(dom.document(), "ul")[0];
        let items = dom.children(&list);

        dom.insert_before(&list, &items[2], Some(&items[0])).unwrap();
        assert_eq!(
            dom.inner_html(list),
            "<li>c</li><li>a</li><li>b</li>"
        );
    }

    #[test]
    fn insert_into_descendant_is_rejected() {
        let mut dom = MemoryDom::parse("<div><p></p></div>");
        let div = dom.elements_by_tag(dom.document(), "div")[0];
        let p = dom.elements_by_tag(dom.document(), "p")[0];

        assert!(matches!(
            dom.insert_before(&p, &div, None),
            Err(DomError::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn remove_child_requires_parent() {
        let mut dom = MemoryDom::parse("<div></div><p></p>");
        let div = dom.elements_by_tag(dom.document(), "div")[0];
        let p = dom.elements_by_tag(dom.document(), "p")[0];

        assert_eq!(dom.remove_child(&div, &p), Err(DomError::NotAChild));
        dom.remove_child(&dom.document(), &p).unwrap();
        assert_eq!(dom.inner_html(dom.document()), "<div></div>");
    }

    #[test]
    fn set_text_content_replaces_children() {
        let mut dom = MemoryDom::parse("<span><b>old</b></span>");
        let span = dom.elements_by_tag(dom.document(), "span")[0];

        dom.set_text_content(&span, "new").unwrap();
        assert_eq!(dom.outer_html(span), "<span>new</span>");
        assert_eq!(dom.text_content(&span), "new");
    }

    #[test]
    fn text_content_skips_comments() {
        let dom = MemoryDom::parse("<p>a<!--hidden-->b</p>");
        let p = dom.elements_by_tag(dom.document(), "p")[0];
        assert_eq!(dom.text_content(&p), "ab");
    }
}
