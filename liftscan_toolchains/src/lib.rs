mod aeneas;
mod charon;
mod process;

pub use aeneas::AeneasToolchain;
pub use charon::CharonToolchain;
pub use process::{ProcessOutput, ProcessRunner};

use std::path::PathBuf;
use std::time::Duration;

use liftscan_toolchain_api::ToolchainRegistry;

/// Default time budget for a single toolchain invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Executable locations and limits for the bundled toolchains.
#[derive(Debug, Clone)]
pub struct ToolchainSettings {
    /// Path or name of the charon executable.
    pub charon: PathBuf,
    /// Path or name of the aeneas executable.
    pub aeneas: PathBuf,
    /// Budget for each invocation.
    pub timeout: Duration,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            charon: PathBuf::from("charon"),
            aeneas: PathBuf::from("aeneas"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Build a registry populated with the charon lowering and aeneas rendering.
#[must_use]
pub fn default_registry(settings: &ToolchainSettings) -> ToolchainRegistry {
    let mut registry = ToolchainRegistry::new();
    registry.register(CharonToolchain::new(ProcessRunner::new(
        &settings.charon,
        settings.timeout,
    )));
    registry.register(AeneasToolchain::new(ProcessRunner::new(
        &settings.aeneas,
        settings.timeout,
    )));
    registry
}
