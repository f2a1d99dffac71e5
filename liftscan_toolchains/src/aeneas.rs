use std::ffi::OsString;
use std::path::Path;

use liftscan_toolchain_api::{
    Toolchain, ToolchainError, ToolchainResult, ToolchainStage, Transform,
};

use crate::ProcessRunner;

/// Renders an `.llbc` file into Coq with aeneas.
///
/// Invoked as `aeneas -backend coq -dest <dir> <file.llbc>`; the output is the
/// destination directory.
#[derive(Debug, Clone)]
pub struct AeneasToolchain {
    runner: ProcessRunner,
}

impl AeneasToolchain {
    /// Construct the toolchain around a configured runner.
    #[must_use]
    pub const fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }
}

impl Toolchain for AeneasToolchain {
    fn id(&self) -> &'static str {
        "aeneas"
    }

    fn label(&self) -> &'static str {
        "Aeneas (LLBC to Coq)"
    }

    fn stage(&self) -> ToolchainStage {
        ToolchainStage::Rendering
    }

    fn transform(&self, input: &Path, output_dir: &Path) -> ToolchainResult<Transform> {
        std::fs::create_dir_all(output_dir).map_err(|err| {
            ToolchainError::message(format!("failed to create {}: {err}", output_dir.display()))
        })?;

        let result = self.runner.run(
            self.id(),
            [
                OsString::from("-backend"),
                OsString::from("coq"),
                OsString::from("-dest"),
                output_dir.as_os_str().to_os_string(),
                input.as_os_str().to_os_string(),
            ],
        )?;

        Ok(Transform {
            input: input.to_path_buf(),
            output: output_dir.to_path_buf(),
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }
}
