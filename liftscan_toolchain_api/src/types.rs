use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a toolchain sits in the conversion chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainStage {
    /// Source file to intermediate representation.
    Lowering,
    /// Intermediate representation to a formal rendering.
    Rendering,
}

/// Summary information about a registered toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainSummary {
    /// Stable identifier for the toolchain.
    pub id: String,
    /// Human-friendly label.
    pub label: String,
    /// Stage the toolchain implements.
    pub stage: ToolchainStage,
}

/// Outcome of one successful transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    /// File handed to the toolchain.
    pub input: PathBuf,
    /// File or directory the toolchain produced.
    pub output: PathBuf,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error; tools report warnings here on success.
    pub stderr: String,
}

/// Errors surfaced by toolchain integrations.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// The executable could not be started.
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        /// Toolchain identifier.
        tool: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The process ran past its time budget and was killed.
    #[error("{tool} timed out after {seconds}s")]
    TimedOut {
        /// Toolchain identifier.
        tool: &'static str,
        /// Configured budget.
        seconds: u64,
    },
    /// The process exited unsuccessfully.
    #[error("{tool} failed with status {status}: {stderr}")]
    Failed {
        /// Toolchain identifier.
        tool: &'static str,
        /// Exit code, or `terminated` when killed by a signal.
        status: String,
        /// Trimmed standard error.
        stderr: String,
    },
    /// Generic failure surfaced by the toolchain.
    #[error("{message}")]
    Failure {
        /// Human-readable error message.
        message: String,
    },
}

impl ToolchainError {
    /// Helper to construct a failure from any displayable message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Convenience result alias for toolchain operations.
pub type ToolchainResult<T> = std::result::Result<T, ToolchainError>;
