//! Annotated pre/post snapshots of each extraction, written to disk.

use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use liftscan_api::{short_oid, ExtractionRecord};
use tracing::{debug, warn};

use crate::annotate::{annotate_function, annotate_range};
use crate::history::HistorySource;
use crate::{Error, Result};

/// Which side of the change a snapshot comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Parent commit, marked by removed range.
    Pre,
    /// Changed commit, marked around the new function.
    Post,
}

impl Side {
    /// Prefix used in artifact file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an artifact was produced by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Written during this call.
    Written,
    /// Already present on disk and left untouched.
    Existing,
}

/// One snapshot file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Snapshot side.
    pub side: Side,
    /// Location of the annotated file.
    pub path: Utf8PathBuf,
    /// Whether it was written now.
    pub status: ArtifactStatus,
}

/// Writes annotated snapshots under `<root>/<repo>/`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: Utf8PathBuf,
}

impl ArtifactWriter {
    /// Writer rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Artifact root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// `<root>/<repo>/<side>_<sha10>__<path with '/' replaced by '_'>`.
    #[must_use]
    pub fn artifact_path(&self, record: &ExtractionRecord, side: Side) -> Utf8PathBuf {
        let (commit, file) = match side {
            Side::Pre => (&record.pre_commit, &record.pre_file),
            Side::Post => (&record.post_commit, &record.post_file),
        };
        let name = format!(
            "{side}_{}__{}",
            short_oid(commit),
            file.replace('/', "_")
        );
        self.root.join(&record.repo).join(name)
    }

    /// Write both snapshots of `record`, skipping any that already exist.
    ///
    /// A side whose snapshot cannot be fetched is logged and left out.
    pub fn write_record<H>(&self, history: &H, record: &ExtractionRecord) -> Vec<Artifact>
    where
        H: HistorySource + ?Sized,
    {
        [Side::Pre, Side::Post]
            .into_iter()
            .filter_map(|side| match self.write_side(history, record, side) {
                Ok(artifact) => Some(artifact),
                Err(err) => {
                    warn!(
                        repo = %record.repo,
                        function = %record.function,
                        %side,
                        error = %err,
                        "skipping snapshot"
                    );
                    None
                }
            })
            .collect()
    }

    fn write_side<H>(&self, history: &H, record: &ExtractionRecord, side: Side) -> Result<Artifact>
    where
        H: HistorySource + ?Sized,
    {
        let path = self.artifact_path(record, side);
        if path.exists() {
            debug!(%path, "artifact exists");
            return Ok(Artifact {
                side,
                path,
                status: ArtifactStatus::Existing,
            });
        }

        let (commit, file) = match side {
            Side::Pre => (&record.pre_commit, &record.pre_file),
            Side::Post => (&record.post_commit, &record.post_file),
        };
        history.fetch_commit(commit)?;
        let text = history.file_at(commit, file)?;
        let marked = match side {
            Side::Pre => annotate_range(&text, record.start_line, record.end_line),
            Side::Post => annotate_function(&text, &record.function),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_string(),
                source,
            })?;
        }
        fs::write(&path, marked).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;
        debug!(%path, "wrote artifact");

        Ok(Artifact {
            side,
            path,
            status: ArtifactStatus::Written,
        })
    }
}
