//! Core library for mining extract-method refactorings from git history.
//!
//! The crate is layered around three responsibilities:
//! - detection: patch scanning, body reconstruction, overlap scoring and
//!   record assembly (`scan`, `body`, `overlap`, `range`, `classify`,
//!   `detect`, `record`)
//! - annotation: sentinel markers around extracted regions (`annotate`,
//!   `artifacts`, `checkout`)
//! - mining: history access, worker scheduling and record persistence
//!   (`history`, `miner`, `pool`, `sink`, `limits`, `toolchain`)

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Sentinel markers around extracted regions.
pub mod annotate;
/// Annotated snapshot files on disk.
pub mod artifacts;
/// Function body reconstruction from patch lines.
pub mod body;
/// Brace depth tracking shared by body extraction and annotation.
pub mod braces;
/// Working-tree checkouts marked in place.
pub mod checkout;
/// Structural flags of a new function.
pub mod classify;
/// TOML configuration.
pub mod config;
/// Detection pipeline over a single file patch.
pub mod detect;
/// Git history access.
pub mod history;
/// Record caps.
pub mod limits;
/// Per-repository mining.
pub mod miner;
/// Removed/new line overlap scoring.
pub mod overlap;
/// Unified diff line classification.
pub mod patch;
/// Worker pool across repositories.
pub mod pool;
/// Pre-image span of removed lines.
pub mod range;
/// Record assembly and validation.
pub mod record;
/// New function declaration scanning.
pub mod scan;
/// Record sinks.
pub mod sink;
/// External toolchain conversion of artifacts.
pub mod toolchain;

pub use detect::{detect, ExtractionCandidate, Rejection};

use liftscan_toolchain_api::{ToolchainError, ToolchainStage};

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying git operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error.
        #[from]
        source: git2::Error,
    },
    /// Provided path does not correspond to a git repository.
    #[error("path does not reference a git repository: {path}")]
    NotARepository {
        /// Path that failed to resolve to a repository.
        path: String,
    },
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
    /// The first parent of a commit lies beyond the cloned history.
    #[error("history is truncated before the parent of {commit}")]
    ShallowHistory {
        /// Commit whose parent is unavailable.
        commit: String,
    },
    /// Configuration file could not be parsed.
    #[error("invalid configuration in {path}: {source}")]
    Config {
        /// Configuration file path.
        path: String,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
    /// Configuration values are out of range.
    #[error("invalid configuration in {path}: {message}")]
    InvalidConfig {
        /// Configuration origin.
        path: String,
        /// Violated constraint.
        message: String,
    },
    /// A record could not be encoded or decoded.
    #[error("record stream {path} is unusable: {source}")]
    Sink {
        /// Record stream path.
        path: String,
        /// Codec error.
        #[source]
        source: serde_json::Error,
    },
    /// A worker panicked while holding the shared sink.
    #[error("record sink lock poisoned")]
    SinkPoisoned,
    /// An external toolchain failed.
    #[error("{tool} failed: {source}")]
    Toolchain {
        /// Toolchain identifier.
        tool: String,
        /// Failure reported by the toolchain.
        #[source]
        source: ToolchainError,
    },
    /// No toolchain is registered for a conversion stage.
    #[error("no toolchain registered for {stage:?}")]
    ToolchainUnavailable {
        /// Missing stage.
        stage: ToolchainStage,
    },
    /// Cloning a remote repository failed.
    #[error("failed to clone {url}: {source}")]
    Clone {
        /// Remote URL.
        url: String,
        /// Original libgit2 error.
        #[source]
        source: git2::Error,
    },
    /// The worker pool could not be started.
    #[error("failed to start worker pool: {source}")]
    WorkerPool {
        /// Rayon build error.
        #[from]
        source: rayon::ThreadPoolBuildError,
    },
}
