#![cfg_attr(docsrs, feature(doc_cfg))]

//! # islet-runtime
//!
//! Browser-side hydration engine for islet universal components.
//!
//! The server embeds every universal component instance between a marker
//! triple (`<!--start--><!--{"componentName":..,"props":..}-->...<!--end-->`).
//! This crate scans a DOM for those triples, builds a per-page lookup table of
//! instances and hydrates each one through a [`VirtualContainer`] that only
//! ever touches the nodes between its two boundary comments.
//!
//! The DOM is reached through the [`Dom`] trait. [`MemoryDom`] is a small
//! in-memory implementation (with an HTML fragment parser) used for tests and
//! tooling; the `web` feature binds the same trait to `web-sys`.
//!
//! ## Quick Start
//!
//! ```
//! use islet_runtime::{markers, InstanceRegistry, MemoryDom};
//! use serde_json::json;
//!
//! let html = markers::render_container("Counter", &json!({ "start": 3 }), "<b>3</b>", false);
//! let dom = MemoryDom::parse(&html);
//!
//! let mut registry = InstanceRegistry::new(dom.document());
//! let instances = registry.lookup(&dom, "Counter");
//! assert_eq!(instances.len(), 1);
//! assert_eq!(instances[0].info.props["start"], 3);
//! ```

pub mod container;
pub mod dom;
pub mod hydrate;
pub mod markers;
pub mod memory;
pub mod registry;
pub mod scan;
pub mod strip;

#[cfg(feature = "web")]
#[cfg_attr(docsrs, doc(cfg(feature = "web")))]
pub mod web;

pub use container::{create_virtual_container, VirtualContainer};
pub use dom::{Dom, DomError, NodeKind};
pub use hydrate::{
    hydrate_all, hydrate_record, rehydrate, HydratedInstance, HydrationReport, RenderError,
    Renderer,
};
pub use markers::{InstanceInfo, END_MARKER, ROOT_ATTRIBUTE, START_MARKER, STRIP_TAG};
pub use memory::{ListenerId, MemoryDom, NodeId};
pub use registry::InstanceRegistry;
pub use scan::{scan_siblings, scan_subtree, InstanceRecord, ScanState, Scanner};
pub use strip::strip_containerless;

#[cfg(feature = "web")]
pub use web::WebDom;

/// Errors raised while reconstructing or hydrating component instances.
///
/// Every variant is scoped to one component instance; sibling instances are
/// unaffected.
#[derive(Debug, thiserror::Error)]
pub enum HydrationError {
    /// The info comment after a start marker is missing or is not valid JSON.
    ///
    /// `component` is read from the raw payload when the name itself survived.
    #[error(
        "malformed marker payload{} at sibling {position}: {message}",
        component.as_ref().map(|c| format!(" of `{c}`")).unwrap_or_default()
    )]
    MalformedPayload {
        component: Option<String>,
        position: usize,
        payload: String,
        message: String,
    },

    /// The sibling list ended before the end marker of an open instance.
    #[error(
        "unterminated instance{} opened at sibling {position}",
        component.as_ref().map(|c| format!(" of `{c}`")).unwrap_or_default()
    )]
    Unterminated {
        component: Option<String>,
        position: usize,
    },

    /// A structural DOM operation failed for this instance.
    #[error("DOM operation failed while hydrating `{component}`: {source}")]
    Dom {
        component: String,
        #[source]
        source: DomError,
    },

    /// The rendering library rejected the instance.
    #[error("renderer failed for `{component}`: {source}")]
    Render {
        component: String,
        #[source]
        source: RenderError,
    },
}

impl HydrationError {
    /// Name of the component the error is attributed to, when known.
    pub fn component(&self) -> Option<&str> {
        match self {
            HydrationError::MalformedPayload { component, .. }
            | HydrationError::Unterminated { component, .. } => component.as_deref(),
            HydrationError::Dom { component, .. } | HydrationError::Render { component, .. } => {
                Some(component)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, HydrationError>;
