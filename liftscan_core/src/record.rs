//! Turns an accepted candidate into an [`ExtractionRecord`].

use liftscan_api::{ExtractionRecord, RecordKey};

use crate::detect::{ExtractionCandidate, Rejection};

/// Where a candidate was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Short repository name.
    pub repo: String,
    /// First-parent commit id.
    pub pre_commit: String,
    /// Commit that introduced the change.
    pub post_commit: String,
    /// Path in the parent commit.
    pub pre_file: String,
    /// Path in the changed commit.
    pub post_file: String,
    /// Author identity of the changed commit.
    pub author: String,
    /// ISO-8601 commit date.
    pub date: String,
}

impl Provenance {
    /// Resume key of the file change this provenance describes.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            repo: self.repo.clone(),
            post_commit: self.post_commit.clone(),
            post_file: self.post_file.clone(),
        }
    }
}

/// Validate `candidate` and combine it with `provenance`.
///
/// # Errors
///
/// [`Rejection::LowOverlap`] when the score is below the threshold,
/// [`Rejection::NoRemovedRange`] without a removed span, and
/// [`Rejection::InvalidRecord`] for empty identifiers.
pub fn assemble(
    candidate: ExtractionCandidate,
    provenance: &Provenance,
) -> Result<ExtractionRecord, Rejection> {
    if !candidate.score.is_accepted() {
        return Err(Rejection::LowOverlap {
            function: candidate.function,
            score: candidate.score,
        });
    }
    let Some(range) = candidate.removed_range else {
        return Err(Rejection::NoRemovedRange {
            function: candidate.function,
        });
    };
    if range.start == 0 || range.start > range.end {
        return Err(invalid(format!(
            "line range {}..={} is not a valid span",
            range.start, range.end
        )));
    }
    if candidate.function.is_empty() {
        return Err(invalid("function name is empty".to_owned()));
    }
    for (field, value) in [
        ("repo", &provenance.repo),
        ("post_commit", &provenance.post_commit),
        ("post_file", &provenance.post_file),
    ] {
        if value.is_empty() {
            return Err(invalid(format!("{field} is empty")));
        }
    }

    Ok(ExtractionRecord {
        repo: provenance.repo.clone(),
        pre_commit: provenance.pre_commit.clone(),
        post_commit: provenance.post_commit.clone(),
        pre_file: provenance.pre_file.clone(),
        post_file: provenance.post_file.clone(),
        function: candidate.function,
        start_line: range.start,
        end_line: range.end,
        match_pct: candidate.score.value(),
        generic: candidate.generic,
        is_async: candidate.is_async,
        author: provenance.author.clone(),
        date: provenance.date.clone(),
    })
}

fn invalid(reason: String) -> Rejection {
    Rejection::InvalidRecord { reason }
}
