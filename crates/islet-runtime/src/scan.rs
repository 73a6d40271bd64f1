//! Marker scanning.
//!
//! [`Scanner`] walks one sibling list left to right and never backtracks:
//!
//! * `SeekingStart` skips nodes until a start comment,
//! * `AfterStart` requires the info comment and parses its JSON,
//! * `CollectingContent` gathers owned nodes until the matching end comment,
//! * `Commit` yields the finished record and goes back to seeking,
//! * `Terminal` is reached at the end of the list.
//!
//! Reaching the end while an instance is open is an error, as is a malformed
//! payload. Both are scoped to the instance: after a malformed payload the
//! scanner skips to that instance's end marker and keeps going.

use tracing::debug;

use crate::dom::{Dom, NodeKind};
use crate::markers::{self, InstanceInfo, END_MARKER, ROOT_ATTRIBUTE, START_MARKER};
use crate::{HydrationError, Result};

/// One reconstructed component instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord<N> {
    pub info: InstanceInfo,
    pub start_node: N,
    pub end_node: N,
    /// Content nodes strictly between the info comment and the end marker.
    pub nodes: Vec<N>,
}

#[derive(Debug)]
pub enum ScanState<N> {
    SeekingStart,
    AfterStart {
        start: N,
        position: usize,
    },
    CollectingContent {
        start: N,
        position: usize,
        info: InstanceInfo,
        nodes: Vec<N>,
        /// Nested start markers not yet closed.
        depth: usize,
    },
    Commit(InstanceRecord<N>),
    Terminal,
}

pub struct Scanner<'a, D: Dom> {
    dom: &'a D,
    siblings: Vec<D::Node>,
    index: usize,
    state: ScanState<D::Node>,
}

impl<'a, D: Dom> Scanner<'a, D> {
    /// Scan the children of `parent`.
    pub fn new(dom: &'a D, parent: &D::Node) -> Self {
        Self::over(dom, dom.children(parent))
    }

    /// Scan an explicit sibling list.
    pub fn over(dom: &'a D, siblings: Vec<D::Node>) -> Self {
        Self {
            dom,
            siblings,
            index: 0,
            state: ScanState::SeekingStart,
        }
    }

    pub fn state(&self) -> &ScanState<D::Node> {
        &self.state
    }

    fn marker(&self, node: &D::Node) -> Option<String> {
        if self.dom.node_kind(node) != NodeKind::Comment {
            return None;
        }
        self.dom
            .comment_data(node)
            .map(|data| data.trim().to_string())
    }

    fn step(
        &self,
        state: ScanState<D::Node>,
        node: D::Node,
        position: usize,
    ) -> Result<ScanState<D::Node>> {
        let marker = self.marker(&node);
        Ok(match state {
            ScanState::SeekingStart => match marker.as_deref() {
                Some(START_MARKER) => ScanState::AfterStart {
                    start: node,
                    position,
                },
                _ => ScanState::SeekingStart,
            },
            ScanState::AfterStart { start, position } => {
                let Some(payload) = marker else {
                    return Err(HydrationError::MalformedPayload {
                        component: None,
                        position,
                        payload: self.dom.text_content(&node),
                        message: "expected an info comment after the start marker".to_string(),
                    });
                };
                let info = markers::decode_info(&payload).map_err(|err| {
                    HydrationError::MalformedPayload {
                        component: markers::component_name_hint(&payload),
                        position,
                        payload: payload.clone(),
                        message: err.to_string(),
                    }
                })?;
                ScanState::CollectingContent {
                    start,
                    position,
                    info,
                    nodes: Vec::new(),
                    depth: 0,
                }
            }
            ScanState::CollectingContent {
                start,
                position,
                info,
                mut nodes,
                depth,
            } => match marker.as_deref() {
                Some(END_MARKER) if depth == 0 => ScanState::Commit(InstanceRecord {
                    info,
                    start_node: start,
                    end_node: node,
                    nodes,
                }),
                Some(END_MARKER) => {
                    nodes.push(node);
                    ScanState::CollectingContent {
                        start,
                        position,
                        info,
                        nodes,
                        depth: depth - 1,
                    }
                }
                Some(START_MARKER) => {
                    nodes.push(node);
                    ScanState::CollectingContent {
                        start,
                        position,
                        info,
                        nodes,
                        depth: depth + 1,
                    }
                }
                _ => {
                    nodes.push(node);
                    ScanState::CollectingContent {
                        start,
                        position,
                        info,
                        nodes,
                        depth,
                    }
                }
            },
            state @ (ScanState::Commit(_) | ScanState::Terminal) => state,
        })
    }

    /// Skip past the end marker of the instance whose payload was rejected.
    fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(node) = self.siblings.get(self.index) {
            self.index += 1;
            match self.marker(node).as_deref() {
                Some(START_MARKER) => depth += 1,
                Some(END_MARKER) if depth == 0 => return,
                Some(END_MARKER) => depth -= 1,
                _ => {}
            }
        }
    }
}

impl<D: Dom> Iterator for Scanner<'_, D> {
    type Item = Result<InstanceRecord<D::Node>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, ScanState::SeekingStart) {
                ScanState::Terminal => {
                    self.state = ScanState::Terminal;
                    return None;
                }
                ScanState::Commit(record) => return Some(Ok(record)),
                state => {
                    let Some(node) = self.siblings.get(self.index).cloned() else {
                        self.state = ScanState::Terminal;
                        return match state {
                            ScanState::AfterStart { position, .. } => {
                                Some(Err(HydrationError::Unterminated {
                                    component: None,
                                    position,
                                }))
                            }
                            ScanState::CollectingContent { info, position, .. } => {
                                Some(Err(HydrationError::Unterminated {
                                    component: Some(info.component_name),
                                    position,
                                }))
                            }
                            _ => None,
                        };
                    };

                    let position = self.index;
                    self.index += 1;
                    match self.step(state, node, position) {
                        Ok(next) => self.state = next,
                        Err(err) => {
                            // the offending node was the info slot; the rest of
                            // the instance is still ahead of us
                            self.index = position;
                            self.recover();
                            self.state = ScanState::SeekingStart;
                            return Some(Err(err));
                        }
                    }
                }
            }
        }
    }
}

/// Strictly scan the children of `parent`; the first error aborts.
pub fn scan_siblings<D: Dom>(dom: &D, parent: &D::Node) -> Result<Vec<InstanceRecord<D::Node>>> {
    Scanner::new(dom, parent).collect()
}

/// Scan every retrieval root under `root` (inclusive).
///
/// Retrieval roots are elements carrying [`ROOT_ATTRIBUTE`]. Roots that sit
/// inside the content of an instance found earlier belong to that instance's
/// render tree and are skipped. Errors are collected per instance rather than
/// aborting the scan.
pub fn scan_subtree<D: Dom>(
    dom: &D,
    root: &D::Node,
) -> (Vec<InstanceRecord<D::Node>>, Vec<HydrationError>) {
    let mut records: Vec<InstanceRecord<D::Node>> = Vec::new();
    let mut errors = Vec::new();

    for element in dom.descendant_elements(root) {
        if dom.get_attribute(&element, ROOT_ATTRIBUTE).is_none() {
            continue;
        }
        if is_owned_by_any(dom, &element, &records) {
            continue;
        }
        for result in Scanner::new(dom, &element) {
            match result {
                Ok(record) => records.push(record),
                Err(err) => errors.push(err),
            }
        }
    }

    debug!(
        instances = records.len(),
        errors = errors.len(),
        "scanned marker triples"
    );
    (records, errors)
}

fn is_owned_by_any<D: Dom>(dom: &D, node: &D::Node, records: &[InstanceRecord<D::Node>]) -> bool {
    let mut current = dom.parent(node);
    while let Some(ancestor) = current {
        if records.iter().any(|record| record.nodes.contains(&ancestor)) {
            return true;
        }
        current = dom.parent(&ancestor);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDom;

    fn root_children(html: &str) -> (MemoryDom, crate::memory::NodeId) {
        let dom = MemoryDom::parse(&format!("<div data-islet-root>{html}</div>"));
        let root = dom.children(&dom.document())[0];
        (dom, root)
    }

    #[test]
    fn skips_unrelated_siblings_while_seeking() {
        let (dom, root) = root_children(
            "<p>static</p><!--note--><!--start--><!--{\"componentName\":\"A\",\"props\":{}}--><b>x</b><!--end--><p>tail</p>",
        );
        let records = scan_siblings(&dom, &root).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.component_name, "A");
        assert_eq!(records[0].nodes.len(), 1);
    }

    #[test]
    fn start_marker_without_info_is_malformed() {
        let (dom, root) = root_children("<!--start--><b>x</b><!--end-->");
        let err = scan_siblings(&dom, &root).unwrap_err();
        assert!(matches!(err, HydrationError::MalformedPayload { position: 0, .. }));
    }

    #[test]
    fn invalid_json_is_malformed_and_scan_recovers() {
        let (dom, root) = root_children(
            "<!--start--><!--{nope--><i></i><!--end--><!--start--><!--{\"componentName\":\"B\"}--><!--end-->",
        );
        let results: Vec<_> = Scanner::new(&dom, &root).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(HydrationError::MalformedPayload { .. })
        ));
        let record = results[1].as_ref().unwrap();
        assert_eq!(record.info.component_name, "B");
        assert!(record.nodes.is_empty());
    }

    #[test]
    fn malformed_payload_names_the_component_when_readable() {
        let (dom, root) = root_children(
            "<!--start--><!--{\"componentName\":\"components_Clock_js\",\"props\":{x:1}}--><!--end-->",
        );
        let err = scan_siblings(&dom, &root).unwrap_err();
        assert_eq!(err.component(), Some("components_Clock_js"));
        assert!(err.to_string().contains("of `components_Clock_js` at sibling 0"));

        let (dom, root) = root_children("<!--start--><b>x</b><!--end-->");
        let err = scan_siblings(&dom, &root).unwrap_err();
        assert_eq!(err.component(), None);
    }

    #[test]
    fn missing_end_marker_is_unterminated() {
        let (dom, root) =
            root_children("<!--start--><!--{\"componentName\":\"C\",\"props\":1}--><span></span>");
        match scan_siblings(&dom, &root) {
            Err(HydrationError::Unterminated {
                component: Some(name),
                position: 0,
            }) => assert_eq!(name, "C"),
            other => panic!("expected unterminated instance, got {other:?}"),
        }
    }

    #[test]
    fn nested_triples_stay_inside_the_outer_instance() {
        let inner = markers::embed("Inner", &serde_json::json!({}), "<i></i>");
        let outer = markers::embed("Outer", &serde_json::json!({}), &format!("<b></b>{inner}"));
        let (dom, root) = root_children(&outer);

        let records = scan_siblings(&dom, &root).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.component_name, "Outer");
        // <b>, inner start, inner info, <i>, inner end
        assert_eq!(records[0].nodes.len(), 5);
    }

    #[test]
    fn subtree_scan_ignores_roots_inside_instances() {
        let inner = markers::render_container("Inner", &serde_json::json!({}), "", false);
        let outer = markers::render_container(
            "Outer",
            &serde_json::json!({}),
            &format!("<section>{inner}</section>"),
            false,
        );
        let dom = MemoryDom::parse(&outer);

        let (records, errors) = scan_subtree(&dom, &dom.document());
        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.component_name, "Outer");
    }
}
