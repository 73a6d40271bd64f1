//! Virtual mount target spanning the nodes between two boundary comments.
//!
//! A rendering library mounts into a [`VirtualContainer`] as if it were an
//! element. Every mutation goes through the container so that its owned list
//! always equals the real siblings strictly between `start_node` and
//! `end_node`. Nodes outside that range are never exposed or touched.

use crate::dom::{Dom, DomError, NodeKind};
use crate::scan::InstanceRecord;

#[derive(Debug, Clone)]
pub struct VirtualContainer<D: Dom> {
    parent: D::Node,
    start_node: D::Node,
    end_node: D::Node,
    nodes: Vec<D::Node>,
}

/// Build a container over `{ initial_nodes, start_node, end_node }`.
///
/// The real parent is taken from `end_node`.
pub fn create_virtual_container<D: Dom>(
    dom: &D,
    initial_nodes: Vec<D::Node>,
    start_node: D::Node,
    end_node: D::Node,
) -> Result<VirtualContainer<D>, DomError> {
    let parent = dom.parent(&end_node).ok_or(DomError::NotAChild)?;
    if dom.parent(&start_node).as_ref() != Some(&parent) {
        return Err(DomError::NotAChild);
    }
    Ok(VirtualContainer {
        parent,
        start_node,
        end_node,
        nodes: initial_nodes,
    })
}

impl<D: Dom> VirtualContainer<D> {
    /// Container over a scanned instance's content.
    pub fn from_record(dom: &D, record: &InstanceRecord<D::Node>) -> Result<Self, DomError> {
        create_virtual_container(
            dom,
            record.nodes.clone(),
            record.start_node.clone(),
            record.end_node.clone(),
        )
    }

    pub fn first_child(&self) -> Option<&D::Node> {
        self.nodes.first()
    }

    pub fn last_child(&self) -> Option<&D::Node> {
        self.nodes.last()
    }

    pub fn child_nodes(&self) -> &[D::Node] {
        &self.nodes
    }

    /// Containers present themselves as elements to the reconciler.
    pub fn node_type(&self) -> u16 {
        NodeKind::Element.node_type()
    }

    pub fn owner_document(&self, dom: &D) -> D::Node {
        dom.owner_document(&self.parent)
    }

    pub fn parent_node(&self) -> &D::Node {
        &self.parent
    }

    pub fn start_node(&self) -> &D::Node {
        &self.start_node
    }

    pub fn end_node(&self) -> &D::Node {
        &self.end_node
    }

    pub fn contains(&self, node: &D::Node) -> bool {
        self.nodes.contains(node)
    }

    /// Append `child` directly before `end_node`.
    pub fn append_child(&mut self, dom: &mut D, child: &D::Node) -> Result<(), DomError> {
        self.guard_boundary(child)?;
        dom.insert_before(&self.parent, child, Some(&self.end_node))?;
        self.nodes.retain(|node| node != child);
        self.nodes.push(child.clone());
        Ok(())
    }

    /// Insert `child` before an owned `reference`, or append when `None`.
    pub fn insert_before(
        &mut self,
        dom: &mut D,
        child: &D::Node,
        reference: Option<&D::Node>,
    ) -> Result<(), DomError> {
        let Some(reference) = reference else {
            return self.append_child(dom, child);
        };
        self.guard_boundary(child)?;
        if !self.contains(reference) {
            return Err(DomError::NotOwned);
        }

        dom.insert_before(&self.parent, child, Some(reference))?;
        self.nodes.retain(|node| node != child);
        let index = self
            .nodes
            .iter()
            .position(|node| node == reference)
            .ok_or(DomError::NotOwned)?;
        self.nodes.insert(index, child.clone());
        Ok(())
    }

    pub fn remove_child(&mut self, dom: &mut D, child: &D::Node) -> Result<(), DomError> {
        if !self.contains(child) {
            return Err(DomError::NotOwned);
        }
        dom.remove_child(&self.parent, child)?;
        self.nodes.retain(|node| node != child);
        Ok(())
    }

    /// Event registration is forwarded to the real parent element.
    pub fn add_event_listener(
        &self,
        dom: &mut D,
        event: &str,
        listener: D::Listener,
    ) -> Result<(), DomError> {
        dom.add_event_listener(&self.parent, event, listener)
    }

    /// Does the owned list equal the real siblings between the info comment
    /// and `end_node`?
    pub fn check_invariant(&self, dom: &D) -> bool {
        // the info comment sits directly after the start marker
        let Some(info) = dom
            .next_sibling(&self.start_node)
            .filter(|node| *node != self.end_node)
        else {
            return false;
        };
        let mut actual = Vec::with_capacity(self.nodes.len());
        let mut current = dom.next_sibling(&info);
        while let Some(node) = current {
            if node == self.end_node {
                return actual == self.nodes;
            }
            current = dom.next_sibling(&node);
            actual.push(node);
        }
        false
    }

    /// Snapshot used to rebuild a container over the live tree.
    pub fn into_parts(self) -> (Vec<D::Node>, D::Node, D::Node) {
        (self.nodes, self.start_node, self.end_node)
    }

    fn guard_boundary(&self, child: &D::Node) -> Result<(), DomError> {
        if *child == self.start_node || *child == self.end_node {
            return Err(DomError::InvalidHierarchy(
                "boundary markers cannot be moved".to_string(),
            ));
        }
        Ok(())
    }
}
