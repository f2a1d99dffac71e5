//! Mines one repository's history for extraction records.

use std::collections::HashSet;

use liftscan_api::{ExtractionRecord, RecordKey, RepositorySlug};
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactWriter;
use crate::detect::detect;
use crate::history::{iso_date, CommitPair, FilePatch, GitHistory, HistorySource};
use crate::limits::{RecordBudget, RecordLimit};
use crate::record::{assemble, Provenance};
use crate::sink::{RecordSink, SharedSink};
use crate::{Error, Result};

/// Why a repository scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every commit was examined.
    Completed,
    /// A per-repository or total cap was hit.
    LimitReached,
    /// The walk reached the edge of the cloned history.
    ShallowBoundary,
}

/// Records found in one repository and how the scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryScan {
    /// Accepted records in discovery order.
    pub records: Vec<ExtractionRecord>,
    /// Why the scan stopped.
    pub outcome: ScanOutcome,
    /// Commits whose patches were examined.
    pub commits: usize,
}

/// Settings shared by every repository scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerOptions {
    /// File extensions considered, without the dot.
    pub extensions: Vec<String>,
    /// Record caps.
    pub limit: RecordLimit,
    /// Clone depth.
    pub depth: u32,
    /// Base URL repository slugs are appended to.
    pub host: String,
}

impl Default for MinerOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["rs".to_owned()],
            limit: RecordLimit::default(),
            depth: 500,
            host: "https://github.com".to_owned(),
        }
    }
}

impl MinerOptions {
    fn accepts(&self, path: &str) -> bool {
        path.rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.iter().any(|wanted| wanted == ext))
    }
}

/// Per-repository summary produced by [`Miner::mine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReport {
    /// Repository that was scanned.
    pub slug: RepositorySlug,
    /// Records appended to the sink.
    pub records: usize,
    /// How the scan ended, or `None` when the repository could not be scanned.
    pub outcome: Option<ScanOutcome>,
}

/// Scans repositories and appends their records to a shared sink.
pub struct Miner<'a, S> {
    options: &'a MinerOptions,
    budget: &'a RecordBudget,
    recorded: &'a HashSet<RecordKey>,
    sink: &'a SharedSink<S>,
    artifacts: Option<&'a ArtifactWriter>,
}

impl<'a, S: RecordSink> Miner<'a, S> {
    /// Miner appending to `sink`, skipping file changes in `recorded`.
    #[must_use]
    pub const fn new(
        options: &'a MinerOptions,
        budget: &'a RecordBudget,
        recorded: &'a HashSet<RecordKey>,
        sink: &'a SharedSink<S>,
    ) -> Self {
        Self {
            options,
            budget,
            recorded,
            sink,
            artifacts: None,
        }
    }

    /// Also write annotated snapshots while each clone is available.
    #[must_use]
    pub fn with_artifacts(mut self, writer: &'a ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    /// Clone `slug` shallowly, scan it and append its records.
    ///
    /// Clone and scan failures are logged; the report carries no outcome.
    pub fn mine(&self, slug: &RepositorySlug) -> RepositoryReport {
        match self.try_mine(slug) {
            Ok((records, outcome)) => RepositoryReport {
                slug: slug.clone(),
                records,
                outcome: Some(outcome),
            },
            Err(err) => {
                warn!(repo = %slug, error = %err, "repository skipped");
                RepositoryReport {
                    slug: slug.clone(),
                    records: 0,
                    outcome: None,
                }
            }
        }
    }

    /// Scan an already opened history and append its records.
    ///
    /// # Errors
    ///
    /// Returns an error when the history cannot be walked or the sink fails.
    pub fn mine_history<H>(&self, repo: &str, history: &H) -> Result<(usize, ScanOutcome)>
    where
        H: HistorySource + ?Sized,
    {
        let scan = scan_history(history, repo, self.options, self.budget, self.recorded)?;
        if let Some(writer) = self.artifacts {
            for record in &scan.records {
                writer.write_record(history, record);
            }
        }
        self.sink.append_batch(&scan.records)?;
        info!(
            repo,
            records = scan.records.len(),
            commits = scan.commits,
            outcome = ?scan.outcome,
            "repository scanned"
        );
        Ok((scan.records.len(), scan.outcome))
    }

    fn try_mine(&self, slug: &RepositorySlug) -> Result<(usize, ScanOutcome)> {
        let workspace = Builder::new()
            .prefix("liftscan-")
            .tempdir()
            .map_err(|source| Error::Io {
                path: std::env::temp_dir().display().to_string(),
                source,
            })?;
        let url = slug.clone_url(&self.options.host);
        let history =
            GitHistory::clone_shallow(&url, workspace.path().join(slug.name()), self.options.depth)?;
        self.mine_history(slug.name(), &history)
    }
}

/// Walk `history` and collect records, honouring caps and skipped keys.
///
/// Rejected candidates and unreadable commits are logged and skipped. A
/// parent outside the cloned history ends the walk with the records found so
/// far.
///
/// # Errors
///
/// Returns an error only when the commit list cannot be read.
pub fn scan_history<H>(
    history: &H,
    repo: &str,
    options: &MinerOptions,
    budget: &RecordBudget,
    recorded: &HashSet<RecordKey>,
) -> Result<RepositoryScan>
where
    H: HistorySource + ?Sized,
{
    let mut scan = RepositoryScan {
        records: Vec::new(),
        outcome: ScanOutcome::Completed,
        commits: 0,
    };
    let previously = recorded.iter().filter(|key| key.repo == repo).count();

    for commit in history.commits()? {
        let patches = match history.diff_against_parent(&commit) {
            Ok(patches) => patches,
            Err(Error::ShallowHistory { commit }) => {
                debug!(repo, commit, "reached shallow history boundary");
                scan.outcome = ScanOutcome::ShallowBoundary;
                break;
            }
            Err(err) => {
                warn!(repo, commit = %commit.revision.oid, error = %err, "skipping commit");
                continue;
            }
        };
        scan.commits += 1;

        for patch in &patches {
            if !options.limit.repository_allows(previously + scan.records.len())
                || budget.is_exhausted()
            {
                scan.outcome = ScanOutcome::LimitReached;
                return Ok(scan);
            }
            if !options.accepts(&patch.new_path) {
                continue;
            }

            let provenance = provenance(repo, &commit, patch);
            if recorded.contains(&provenance.key()) {
                debug!(repo, file = %patch.new_path, "already recorded");
                continue;
            }

            let record = match detect(&patch.patch)
                .and_then(|candidate| assemble(candidate, &provenance))
            {
                Ok(record) => record,
                Err(rejection) => {
                    debug!(repo, file = %patch.new_path, %rejection, "no extraction");
                    continue;
                }
            };
            if !budget.try_claim() {
                scan.outcome = ScanOutcome::LimitReached;
                return Ok(scan);
            }
            debug!(repo, function = %record.function, file = %record.post_file, "extraction found");
            scan.records.push(record);
        }
    }

    Ok(scan)
}

/// Clone `slug` and write annotated snapshots for `records`.
///
/// Returns the number of artifacts present afterwards; failures are logged.
pub fn annotate_repository(
    slug: &RepositorySlug,
    records: &[ExtractionRecord],
    options: &MinerOptions,
    writer: &ArtifactWriter,
) -> usize {
    let history = Builder::new()
        .prefix("liftscan-")
        .tempdir()
        .map_err(|source| Error::Io {
            path: std::env::temp_dir().display().to_string(),
            source,
        })
        .and_then(|workspace| {
            let url = slug.clone_url(&options.host);
            let history = GitHistory::clone_shallow(
                &url,
                workspace.path().join(slug.name()),
                options.depth,
            )?;
            Ok((workspace, history))
        });

    match history {
        Ok((_workspace, history)) => records
            .iter()
            .map(|record| writer.write_record(&history, record).len())
            .sum(),
        Err(err) => {
            warn!(repo = %slug, error = %err, "cannot annotate repository");
            0
        }
    }
}

fn provenance(repo: &str, commit: &CommitPair, patch: &FilePatch) -> Provenance {
    Provenance {
        repo: repo.to_owned(),
        pre_commit: commit.parent.clone(),
        post_commit: commit.revision.oid.clone(),
        pre_file: patch.pre_path().to_owned(),
        post_file: patch.new_path.clone(),
        author: commit.revision.author_identity(),
        date: iso_date(&commit.revision).unwrap_or_default(),
    }
}
