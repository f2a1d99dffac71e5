//! Commit history access built on top of libgit2.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use git2::{
    build::RepoBuilder, Delta, DiffFindOptions, DiffOptions, ErrorClass, ErrorCode,
    FetchOptions, Oid, Patch, Repository as GitRepository,
};
use liftscan_api::{Revision, Signature};
use tracing::{debug, info};

use crate::{Error, Result};

/// A commit together with its first parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPair {
    /// First-parent commit id.
    pub parent: String,
    /// The commit itself.
    pub revision: Revision,
}

/// Unified patch of one file between a commit and its first parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Path on the parent side, absent for added files.
    pub old_path: Option<String>,
    /// Path on the commit side.
    pub new_path: String,
    /// Patch text including `diff --git` and hunk headers.
    pub patch: String,
}

impl FilePatch {
    /// Pre-change path, falling back to the post-change path.
    #[must_use]
    pub fn pre_path(&self) -> &str {
        self.old_path.as_deref().unwrap_or(&self.new_path)
    }
}

/// Read access to a repository's history.
pub trait HistorySource {
    /// Every commit reachable from `HEAD` that has a parent, newest first.
    ///
    /// # Errors
    ///
    /// Propagates failures while walking the history.
    fn commits(&self) -> Result<Vec<CommitPair>>;

    /// Per-file patches of `commit` against its first parent.
    ///
    /// Deleted and binary files are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShallowHistory`] when the parent is outside the local
    /// history, or any error raised while diffing.
    fn diff_against_parent(&self, commit: &CommitPair) -> Result<Vec<FilePatch>>;

    /// Make sure `oid` is available locally, fetching it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the commit is missing and cannot be fetched.
    fn fetch_commit(&self, oid: &str) -> Result<()>;

    /// Contents of `path` at `commit`, decoded lossily as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error when the commit or path does not exist.
    fn file_at(&self, commit: &str, path: &str) -> Result<String>;
}

/// [`HistorySource`] over a local git repository.
pub struct GitHistory {
    inner: GitRepository,
    root: PathBuf,
}

impl GitHistory {
    /// Open a repository (bare or with a working tree) at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotARepository`] when no repository is found.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo = match GitRepository::open(path) {
            Ok(repo) => repo,
            Err(err)
                if err.class() == ErrorClass::Repository && err.code() == ErrorCode::NotFound =>
            {
                return Err(Error::NotARepository {
                    path: display_path(path),
                })
            }
            Err(err) => return Err(Error::from(err)),
        };

        Ok(Self {
            inner: repo,
            root: path.to_path_buf(),
        })
    }

    /// Bare single-branch clone of `url` into `dest` limited to `depth` commits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Clone`] when the clone fails.
    pub fn clone_shallow(url: &str, dest: impl AsRef<Path>, depth: u32) -> Result<Self> {
        let dest = dest.as_ref();
        info!(url, depth, "cloning");

        let mut fetch = FetchOptions::new();
        if depth > 0 {
            fetch.depth(i32::try_from(depth).unwrap_or(i32::MAX));
        }
        let repo = RepoBuilder::new()
            .bare(true)
            .fetch_options(fetch)
            .clone(url, dest)
            .map_err(|source| Error::Clone {
                url: url.to_owned(),
                source,
            })?;

        Ok(Self {
            inner: repo,
            root: dest.to_path_buf(),
        })
    }

    /// Filesystem location of the repository.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find_commit(&self, oid: &str) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(oid)?;
        Ok(self.inner.find_commit(oid)?)
    }
}

impl HistorySource for GitHistory {
    fn commits(&self) -> Result<Vec<CommitPair>> {
        if self.inner.is_empty()? {
            return Ok(Vec::new());
        }
        match self.inner.head() {
            Ok(_) => {}
            Err(err) if is_unborn(&err) => return Ok(Vec::new()),
            Err(err) => return Err(Error::from(err)),
        }

        let mut walk = self.inner.revwalk()?;
        walk.push_head()?;

        let mut pairs = Vec::new();
        for oid in walk {
            let commit = self.inner.find_commit(oid?)?;
            let Ok(parent) = commit.parent_id(0) else {
                continue;
            };
            pairs.push(CommitPair {
                parent: parent.to_string(),
                revision: commit_to_revision(&commit),
            });
        }

        debug!(root = %self.root.display(), commits = pairs.len(), "walked history");
        Ok(pairs)
    }

    fn diff_against_parent(&self, commit: &CommitPair) -> Result<Vec<FilePatch>> {
        let head = self.find_commit(&commit.revision.oid)?;
        let parent = match head.parent(0) {
            Ok(parent) => parent,
            Err(err) if err.code() == ErrorCode::NotFound => {
                return Err(Error::ShallowHistory {
                    commit: commit.revision.oid.clone(),
                })
            }
            Err(err) => return Err(Error::from(err)),
        };

        let mut options = DiffOptions::new();
        options.context_lines(3);
        let mut diff = self.inner.diff_tree_to_tree(
            Some(&parent.tree()?),
            Some(&head.tree()?),
            Some(&mut options),
        )?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

        let mut patches = Vec::new();
        for index in 0..diff.deltas().len() {
            let Some(delta) = diff.get_delta(index) else {
                continue;
            };
            if delta.status() == Delta::Deleted {
                continue;
            }
            let Some(new_path) = delta.new_file().path().map(display_path) else {
                continue;
            };
            let old_path = match delta.status() {
                Delta::Added => None,
                _ => delta.old_file().path().map(display_path),
            };

            let Some(mut patch) = Patch::from_diff(&diff, index)? else {
                continue;
            };
            if delta.flags().is_binary() {
                continue;
            }
            let buf = patch.to_buf()?;
            patches.push(FilePatch {
                old_path,
                new_path,
                patch: String::from_utf8_lossy(&buf).into_owned(),
            });
        }

        Ok(patches)
    }

    fn fetch_commit(&self, oid: &str) -> Result<()> {
        if self.find_commit(oid).is_ok() {
            return Ok(());
        }

        debug!(oid, "fetching missing commit");
        let mut remote = self.inner.find_remote("origin")?;
        let mut fetch = FetchOptions::new();
        fetch.depth(1);
        remote.fetch(&[oid], Some(&mut fetch), None)?;
        self.find_commit(oid).map(|_| ())
    }

    fn file_at(&self, commit: &str, path: &str) -> Result<String> {
        let commit = self.find_commit(commit)?;
        let entry = commit.tree()?.get_path(Path::new(path))?;
        let blob = entry.to_object(&self.inner)?.peel_to_blob()?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

/// RFC 3339 date of `revision` in the committer's own offset.
#[must_use]
pub fn iso_date(revision: &Revision) -> Option<String> {
    let offset = FixedOffset::east_opt(revision.offset_minutes.checked_mul(60)?)?;
    let utc = DateTime::from_timestamp(revision.timestamp, 0)?;
    Some(utc.with_timezone(&offset).to_rfc3339())
}

fn commit_to_revision(commit: &git2::Commit<'_>) -> Revision {
    let author = commit.author();
    Revision {
        oid: commit.id().to_string(),
        summary: commit.summary().map(str::to_owned),
        author: convert_signature(&author),
        timestamp: commit.time().seconds(),
        offset_minutes: commit.time().offset_minutes(),
    }
}

fn convert_signature(signature: &git2::Signature<'_>) -> Option<Signature> {
    signature.name().map(|name| Signature {
        name: name.to_owned(),
        email: signature
            .email()
            .filter(|email| !email.is_empty())
            .map(str::to_owned),
    })
}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(
        (err.class(), err.code()),
        (
            ErrorClass::Reference,
            ErrorCode::NotFound | ErrorCode::UnbornBranch
        )
    )
}

fn display_path(path: &Path) -> String {
    path.to_path_buf()
        .into_os_string()
        .to_string_lossy()
        .into_owned()
}

impl fmt::Debug for GitHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHistory")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
