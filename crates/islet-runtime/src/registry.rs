//! Per-page lookup table of component instances.

use indexmap::IndexMap;

use crate::dom::Dom;
use crate::scan::{scan_subtree, InstanceRecord};
use crate::HydrationError;

struct Table<N> {
    by_name: IndexMap<String, Vec<InstanceRecord<N>>>,
    errors: Vec<HydrationError>,
}

/// Instances grouped by `componentName`.
///
/// The DOM is scanned once, on the first query, and the result is kept for
/// the lifetime of the registry. Later DOM mutations are not observed.
pub struct InstanceRegistry<D: Dom> {
    root: D::Node,
    table: Option<Table<D::Node>>,
}

impl<D: Dom> InstanceRegistry<D> {
    pub fn new(root: D::Node) -> Self {
        Self { root, table: None }
    }

    fn table(&mut self, dom: &D) -> &Table<D::Node> {
        self.table.get_or_insert_with(|| {
            let (records, errors) = scan_subtree(dom, &self.root);
            let mut by_name: IndexMap<String, Vec<InstanceRecord<D::Node>>> = IndexMap::new();
            for record in records {
                by_name
                    .entry(record.info.component_name.clone())
                    .or_default()
                    .push(record);
            }
            for error in &errors {
                tracing::warn!(%error, "skipping corrupt component instance");
            }
            Table { by_name, errors }
        })
    }

    /// Instances of `component_name` in document order; empty when the page
    /// renders none.
    pub fn lookup(&mut self, dom: &D, component_name: &str) -> &[InstanceRecord<D::Node>] {
        self.table(dom)
            .by_name
            .get(component_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Component names found on the page, in order of first appearance.
    pub fn component_names(&mut self, dom: &D) -> Vec<&str> {
        self.table(dom).by_name.keys().map(String::as_str).collect()
    }

    /// Instances that could not be reconstructed.
    pub fn errors(&mut self, dom: &D) -> &[HydrationError] {
        &self.table(dom).errors
    }

    pub fn is_scanned(&self) -> bool {
        self.table.is_some()
    }
}
