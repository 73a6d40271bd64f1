//! Hydration driver.
//!
//! The rendering library is abstracted as a [`Renderer`]: given a render tree
//! and a [`VirtualContainer`] it adopts the server-rendered nodes and returns a
//! handle used for later updates. [`hydrate_all`] runs it for every instance of
//! one component and keeps going when a single instance fails.

use tracing::{debug, warn};

use crate::container::{create_virtual_container, VirtualContainer};
use crate::dom::{Dom, DomError};
use crate::markers::InstanceInfo;
use crate::registry::InstanceRegistry;
use crate::scan::InstanceRecord;
use crate::{HydrationError, Result};

/// Failure reported by a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DomError> for RenderError {
    fn from(err: DomError) -> Self {
        Self::new(err.to_string())
    }
}

/// A rendering library able to adopt server-rendered markup.
///
/// Implementations must mutate the page only through the container they are
/// handed.
pub trait Renderer<D: Dom> {
    type Tree;
    type Handle;

    fn hydrate(
        &mut self,
        dom: &mut D,
        tree: Self::Tree,
        container: &mut VirtualContainer<D>,
    ) -> std::result::Result<Self::Handle, RenderError>;

    fn update(
        &mut self,
        dom: &mut D,
        handle: &mut Self::Handle,
        tree: Self::Tree,
        container: &mut VirtualContainer<D>,
    ) -> std::result::Result<(), RenderError>;
}

/// A live, hydrated component instance.
pub struct HydratedInstance<D: Dom, H> {
    pub info: InstanceInfo,
    pub container: VirtualContainer<D>,
    pub handle: H,
}

impl<D: Dom, H> HydratedInstance<D, H> {
    /// Re-render the instance with a new tree.
    pub fn update<R>(&mut self, dom: &mut D, renderer: &mut R, tree: R::Tree) -> Result<()>
    where
        R: Renderer<D, Handle = H>,
    {
        renderer
            .update(dom, &mut self.handle, tree, &mut self.container)
            .map_err(|source| HydrationError::Render {
                component: self.info.component_name.clone(),
                source,
            })?;
        ensure_invariant(dom, &self.info, &self.container)
    }
}

/// Outcome of hydrating every instance of one component.
pub struct HydrationReport<D: Dom, H> {
    pub hydrated: Vec<HydratedInstance<D, H>>,
    pub failures: Vec<HydrationError>,
}

impl<D: Dom, H> HydrationReport<D, H> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Hydrate every instance of `component_name`.
///
/// `tree_for` builds the render tree from an instance's info payload. A page
/// without instances yields an empty report.
pub fn hydrate_all<D, R, F>(
    dom: &mut D,
    registry: &mut InstanceRegistry<D>,
    component_name: &str,
    renderer: &mut R,
    mut tree_for: F,
) -> HydrationReport<D, R::Handle>
where
    D: Dom,
    R: Renderer<D>,
    F: FnMut(&InstanceInfo) -> R::Tree,
{
    let records = registry.lookup(dom, component_name).to_vec();
    let mut report = HydrationReport {
        hydrated: Vec::with_capacity(records.len()),
        failures: Vec::new(),
    };

    for record in records {
        let tree = tree_for(&record.info);
        match hydrate_record(dom, &record, renderer, tree) {
            Ok(instance) => report.hydrated.push(instance),
            Err(err) => {
                warn!(component = component_name, error = %err, "hydration failed");
                report.failures.push(err);
            }
        }
    }

    debug!(
        component = component_name,
        hydrated = report.hydrated.len(),
        failed = report.failures.len(),
        "hydrated component instances"
    );
    report
}

/// Hydrate a single scanned instance.
pub fn hydrate_record<D, R>(
    dom: &mut D,
    record: &InstanceRecord<D::Node>,
    renderer: &mut R,
    tree: R::Tree,
) -> Result<HydratedInstance<D, R::Handle>>
where
    D: Dom,
    R: Renderer<D>,
{
    let container =
        VirtualContainer::from_record(dom, record).map_err(|source| HydrationError::Dom {
            component: record.info.component_name.clone(),
            source,
        })?;
    mount(dom, record.info.clone(), container, renderer, tree)
}

/// Hydrate again in place, over the nodes the instance currently owns.
///
/// Used after a hot update replaced the component implementation.
pub fn rehydrate<D, R>(
    dom: &mut D,
    instance: HydratedInstance<D, R::Handle>,
    renderer: &mut R,
    tree: R::Tree,
) -> Result<HydratedInstance<D, R::Handle>>
where
    D: Dom,
    R: Renderer<D>,
{
    let HydratedInstance {
        info, container, ..
    } = instance;
    let (nodes, start_node, end_node) = container.into_parts();
    let container = create_virtual_container(dom, nodes, start_node, end_node).map_err(
        |source| HydrationError::Dom {
            component: info.component_name.clone(),
            source,
        },
    )?;
    mount(dom, info, container, renderer, tree)
}

fn mount<D, R>(
    dom: &mut D,
    info: InstanceInfo,
    mut container: VirtualContainer<D>,
    renderer: &mut R,
    tree: R::Tree,
) -> Result<HydratedInstance<D, R::Handle>>
where
    D: Dom,
    R: Renderer<D>,
{
    let handle = renderer
        .hydrate(dom, tree, &mut container)
        .map_err(|source| HydrationError::Render {
            component: info.component_name.clone(),
            source,
        })?;
    ensure_invariant(dom, &info, &container)?;
    Ok(HydratedInstance {
        info,
        container,
        handle,
    })
}

fn ensure_invariant<D: Dom>(
    dom: &D,
    info: &InstanceInfo,
    container: &VirtualContainer<D>,
) -> Result<()> {
    if container.check_invariant(dom) {
        Ok(())
    } else {
        Err(HydrationError::Dom {
            component: info.component_name.clone(),
            source: DomError::InvariantViolated,
        })
    }
}
