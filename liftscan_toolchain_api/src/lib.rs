//! Interfaces for the external toolchains that consume annotated sources.
//!
//! A toolchain is an opaque transform: it receives a file and an output
//! directory, and reports the file it produced. The miner never inspects the
//! intermediate formats.

use std::path::Path;

mod registry;
mod types;

pub use registry::ToolchainRegistry;
pub use types::{ToolchainError, ToolchainResult, ToolchainStage, ToolchainSummary, Transform};

/// Trait implemented by external toolchain integrations (e.g. charon).
pub trait Toolchain: Send + Sync {
    /// Stable identifier used for lookup and logging.
    fn id(&self) -> &'static str;

    /// Human-friendly label for log output.
    fn label(&self) -> &'static str;

    /// Position of the toolchain in the conversion chain.
    fn stage(&self) -> ToolchainStage;

    /// Transform `input`, writing results below `output_dir`.
    ///
    /// # Errors
    ///
    /// Implementors should surface spawn failures, timeouts and non-zero exits.
    fn transform(&self, input: &Path, output_dir: &Path) -> ToolchainResult<Transform>;
}
