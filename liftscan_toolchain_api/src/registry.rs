//! Registry keeps track of available toolchains.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{Toolchain, ToolchainStage, ToolchainSummary};

/// In-memory registry for toolchains.
#[derive(Default)]
pub struct ToolchainRegistry {
    toolchains: HashMap<&'static str, Arc<dyn Toolchain>>,
}

impl ToolchainRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a toolchain keyed by its `Toolchain::id`.
    pub fn register<T>(&mut self, toolchain: T)
    where
        T: Toolchain + 'static,
    {
        self.register_arc(Arc::new(toolchain));
    }

    /// Register an already shared toolchain.
    pub fn register_arc(&mut self, toolchain: Arc<dyn Toolchain>) {
        self.toolchains.insert(toolchain.id(), toolchain);
    }

    /// First registered toolchain for `stage`, by identifier order.
    #[must_use]
    pub fn for_stage(&self, stage: ToolchainStage) -> Option<Arc<dyn Toolchain>> {
        let mut matching: Vec<_> = self
            .toolchains
            .values()
            .filter(|toolchain| toolchain.stage() == stage)
            .collect();
        matching.sort_by_key(|toolchain| toolchain.id());
        matching.into_iter().next().cloned()
    }

    /// Returns the list of registered identifiers.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.toolchains.keys().copied()
    }

    /// Summaries for every registered toolchain, sorted by identifier.
    #[must_use]
    pub fn summaries(&self) -> Vec<ToolchainSummary> {
        let mut summaries: Vec<_> = self
            .toolchains
            .values()
            .map(|toolchain| ToolchainSummary {
                id: toolchain.id().to_owned(),
                label: toolchain.label().to_owned(),
                stage: toolchain.stage(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }
}

impl std::fmt::Debug for ToolchainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.ids().collect();
        ids.sort_unstable();
        f.debug_struct("ToolchainRegistry")
            .field("toolchains", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{ToolchainResult, Transform};

    struct Fake(&'static str, ToolchainStage);

    impl Toolchain for Fake {
        fn id(&self) -> &'static str {
            self.0
        }

        fn label(&self) -> &'static str {
            "Fake"
        }

        fn stage(&self) -> ToolchainStage {
            self.1
        }

        fn transform(&self, input: &Path, output_dir: &Path) -> ToolchainResult<Transform> {
            Ok(Transform {
                input: input.to_path_buf(),
                output: output_dir.to_path_buf(),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn lookup_by_stage_is_deterministic() {
        let mut registry = ToolchainRegistry::new();
        registry.register(Fake("zeta", ToolchainStage::Lowering));
        registry.register(Fake("alpha", ToolchainStage::Lowering));
        registry.register(Fake("render", ToolchainStage::Rendering));

        let lowering = registry
            .for_stage(ToolchainStage::Lowering)
            .expect("lowering registered");
        assert_eq!(lowering.id(), "alpha");
        let ids: Vec<_> = registry
            .summaries()
            .into_iter()
            .map(|summary| summary.id)
            .collect();
        assert_eq!(ids, ["alpha", "render", "zeta"]);
    }
}
