//! Plugin registry with execution phases.
//!
//! Rolldown calls plugins in registration order, so every islet build
//! collects its plugins here and hands them over sorted by phase.

use crate::SharedPluginable;
use rolldown_plugin::Plugin;
use std::sync::Arc;

/// Plugin execution phases
///
/// Plugins are executed in phase order (lower numbers first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginPhase {
    /// Virtual modules (generated wrappers, client entries, marker helper).
    ///
    /// Must claim their ids before anything else tries to resolve them.
    Virtual = 0,

    /// Module resolution tweaks.
    Resolve = 10,

    /// Content transformation.
    Transform = 20,

    /// Work on the finished bundle (asset merging, manifest emission).
    PostProcess = 100,
}

/// A Rolldown plugin that knows its execution phase.
///
/// `Plugin` already requires `Send + Sync`.
pub trait IsletPlugin: Plugin {
    fn phase(&self) -> PluginPhase {
        PluginPhase::Transform
    }
}

/// Plugin registry that maintains plugins in phase order
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<(PluginPhase, SharedPluginable)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin at its own phase.
    ///
    /// Sorting happens once, in [`into_rolldown_plugins`](Self::into_rolldown_plugins).
    pub fn add<P: IsletPlugin + 'static>(&mut self, plugin: P) {
        let phase = plugin.phase();
        let plugin: SharedPluginable = Arc::new(plugin);
        self.plugins.push((phase, plugin));
    }

    /// Add an already shared plugin at an explicit phase.
    pub fn add_with_phase(&mut self, plugin: SharedPluginable, phase: PluginPhase) {
        self.plugins.push((phase, plugin));
    }

    /// Plugins sorted by phase; registration order is kept within a phase.
    pub fn into_rolldown_plugins(self) -> Vec<SharedPluginable> {
        self.into_sorted().into_iter().map(|(_, plugin)| plugin).collect()
    }

    fn into_sorted(mut self) -> Vec<(PluginPhase, SharedPluginable)> {
        self.plugins.sort_by_key(|(phase, _)| *phase);
        self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct Named(&'static str, PluginPhase);

    impl Plugin for Named {
        fn name(&self) -> Cow<'static, str> {
            self.0.into()
        }

        fn register_hook_usage(&self) -> rolldown_plugin::HookUsage {
            rolldown_plugin::HookUsage::ResolveId
        }
    }

    impl IsletPlugin for Named {
        fn phase(&self) -> PluginPhase {
            self.1
        }
    }

    #[test]
    fn plugins_are_ordered_by_phase() {
        let mut registry = PluginRegistry::new();
        registry.add(Named("post", PluginPhase::PostProcess));
        registry.add(Named("virtual", PluginPhase::Virtual));
        registry.add(Named("transform", PluginPhase::Transform));
        registry.add(Named("virtual-2", PluginPhase::Virtual));
        assert_eq!(registry.len(), 4);

        let phases: Vec<_> = registry
            .into_sorted()
            .into_iter()
            .map(|(phase, _)| phase)
            .collect();
        assert_eq!(
            phases,
            vec![
                PluginPhase::Virtual,
                PluginPhase::Virtual,
                PluginPhase::Transform,
                PluginPhase::PostProcess
            ]
        );
    }
}
