//! Full working-tree checkouts of recorded extractions, marked in place.
//!
//! Each case lives in `<root>/<repo>/<sha10>/`, a clone checked out at the
//! post-change commit. The new function is wrapped in sentinel markers inside
//! that tree and listed in an index file at the clone root, so a downstream
//! tool can build the whole crate around the marked region.

use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, Oid, Repository as GitRepository};
use liftscan_api::{short_oid, ExtractionRecord, LineRange};
use tracing::{debug, info, warn};

use crate::annotate::{annotate_range, locate_function, START_MARKER};
use crate::limits::RecordLimit;
use crate::{Error, Result};

/// Index appended at the root of every case checkout.
pub const INDEX_FILE: &str = "SELECTED_EXTRACTION.txt";

/// What happened to one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStatus {
    /// Markers were inserted; the range covers both marker lines.
    Marked(LineRange),
    /// The file already carried markers and was left untouched.
    Existing,
    /// The function was not found in the checked out file.
    FunctionMissing,
}

/// One checked out case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedOutCase {
    /// Root of the working tree.
    pub dir: Utf8PathBuf,
    /// Marked file inside the working tree.
    pub file: Utf8PathBuf,
    /// Outcome of the marking step.
    pub status: CaseStatus,
}

/// Clones and marks cases under `<root>/<repo>/<sha10>/`.
#[derive(Debug, Clone)]
pub struct CheckoutWriter {
    root: Utf8PathBuf,
    depth: u32,
}

impl CheckoutWriter {
    /// Writer rooted at `root`, cloning `depth` commits (0 for full history).
    pub fn new(root: impl Into<Utf8PathBuf>, depth: u32) -> Self {
        Self {
            root: root.into(),
            depth,
        }
    }

    /// Checkout root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// `<root>/<repo>/<sha10>`.
    #[must_use]
    pub fn case_dir(&self, record: &ExtractionRecord) -> Utf8PathBuf {
        self.root
            .join(&record.repo)
            .join(short_oid(&record.post_commit))
    }

    /// Clone `url` for `record` if needed, check out its post-change commit
    /// and mark the new function in place.
    ///
    /// # Errors
    ///
    /// Returns an error when cloning, checkout or file I/O fails.
    pub fn check_out(&self, url: &str, record: &ExtractionRecord) -> Result<CheckedOutCase> {
        let dir = self.case_dir(record);
        let repo = self.open_or_clone(url, &dir)?;
        switch_to(&repo, &record.post_commit)?;

        let file = dir.join(&record.post_file);
        let status = mark_case(&dir, &file, record)?;
        Ok(CheckedOutCase { dir, file, status })
    }

    fn open_or_clone(&self, url: &str, dir: &Utf8Path) -> Result<GitRepository> {
        if dir.join(".git").exists() {
            debug!(%dir, "reusing checkout");
            return Ok(GitRepository::open(dir)?);
        }

        info!(url, %dir, depth = self.depth, "cloning working tree");
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_string(),
                source,
            })?;
        }
        let mut fetch = FetchOptions::new();
        if self.depth > 0 {
            fetch.depth(i32::try_from(self.depth).unwrap_or(i32::MAX));
        }
        RepoBuilder::new()
            .fetch_options(fetch)
            .clone(url, dir.as_std_path())
            .map_err(|source| Error::Clone {
                url: url.to_owned(),
                source,
            })
    }
}

/// Check out the records of one repository from `url`, keeping at most the
/// per-repository cap of `limit`. Returns the number of cases marked by this
/// call; failures are logged.
pub fn checkout_repository(
    url: &str,
    records: &[ExtractionRecord],
    limit: &RecordLimit,
    writer: &CheckoutWriter,
) -> usize {
    let mut marked = 0;
    for (index, record) in records.iter().enumerate() {
        if !limit.repository_allows(index) {
            debug!(url, skipped = records.len() - index, "checkout cap reached");
            break;
        }
        match writer.check_out(url, record) {
            Ok(CheckedOutCase {
                status: CaseStatus::Marked(_),
                ..
            }) => marked += 1,
            Ok(CheckedOutCase {
                status: CaseStatus::FunctionMissing,
                file,
                ..
            }) => warn!(
                repo = %record.repo,
                function = %record.function,
                %file,
                "function not found"
            ),
            Ok(_) => {}
            Err(err) => warn!(
                repo = %record.repo,
                commit = %record.post_commit,
                error = %err,
                "checkout failed"
            ),
        }
    }
    marked
}

fn switch_to(repo: &GitRepository, commit: &str) -> Result<()> {
    let oid = Oid::from_str(commit)?;
    if repo.head().ok().and_then(|head| head.target()) == Some(oid) {
        return Ok(());
    }

    if repo.find_commit(oid).is_err() {
        let fetched = repo.find_remote("origin").and_then(|mut remote| {
            let mut fetch = FetchOptions::new();
            fetch.depth(1);
            remote.fetch(&[commit], Some(&mut fetch), None)
        });
        if let Err(err) = fetched {
            debug!(commit, error = %err, "fetch of case commit failed");
        }
    }

    let target = repo.find_commit(oid)?;
    repo.checkout_tree(target.as_object(), Some(CheckoutBuilder::new().force()))?;
    repo.set_head_detached(oid)?;
    Ok(())
}

fn mark_case(dir: &Utf8Path, file: &Utf8Path, record: &ExtractionRecord) -> Result<CaseStatus> {
    let text = fs::read_to_string(file).map_err(|source| Error::Io {
        path: file.to_string(),
        source,
    })?;
    if text.lines().any(|line| line == START_MARKER) {
        return Ok(CaseStatus::Existing);
    }
    let Some(range) = locate_function(&text, &record.function) else {
        return Ok(CaseStatus::FunctionMissing);
    };

    fs::write(file, annotate_range(&text, range.start, range.end)).map_err(|source| {
        Error::Io {
            path: file.to_string(),
            source,
        }
    })?;
    // Both markers shift the closing line down by one, plus the end marker itself.
    let marked = LineRange::new(range.start, range.end.saturating_add(2)).unwrap_or(range);
    append_index(dir, record, marked)?;
    Ok(CaseStatus::Marked(marked))
}

fn append_index(dir: &Utf8Path, record: &ExtractionRecord, lines: LineRange) -> Result<()> {
    let path = dir.join(INDEX_FILE);
    let io_error = |source| Error::Io {
        path: path.to_string(),
        source,
    };
    let mut index = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_error)?;
    write!(
        index,
        "file: {}\nfn:   {}\nlines:{}-{}\n\n",
        record.post_file, record.function, lines.start, lines.end
    )
    .map_err(io_error)
}
