use serde::{Deserialize, Serialize};

/// A 1-based inclusive line span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    /// First line of the span.
    pub start: u32,
    /// Last line of the span (inclusive).
    pub end: u32,
}

impl LineRange {
    /// Construct a span, returning `None` when `start > end` or `start == 0`.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Option<Self> {
        if start == 0 || start > end {
            return None;
        }
        Some(Self { start, end })
    }

    /// Number of lines covered.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Spans are never empty; provided for clippy's `len_without_is_empty`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub const fn envelope(self, other: Self) -> Self {
        let start = if self.start < other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end > other.end {
            self.end
        } else {
            other.end
        };
        Self { start, end }
    }
}

/// One detected extract-method refactoring.
///
/// Field names follow the record stream schema consumed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Short repository name.
    pub repo: String,
    /// Commit before the change (first parent).
    pub pre_commit: String,
    /// Commit introducing the new function.
    pub post_commit: String,
    /// File path in the pre-change commit.
    pub pre_file: String,
    /// File path in the post-change commit.
    pub post_file: String,
    /// Name of the newly introduced function.
    #[serde(rename = "fn")]
    pub function: String,
    /// First removed line in the pre-change file (1-based).
    pub start_line: u32,
    /// Last removed line in the pre-change file (inclusive).
    pub end_line: u32,
    /// Percentage of removed lines found in the new function body.
    pub match_pct: u8,
    /// Signature carries generic parameters.
    pub generic: bool,
    /// Function is declared `async`.
    #[serde(rename = "async")]
    pub is_async: bool,
    /// Author identity of the post-change commit.
    pub author: String,
    /// Commit timestamp in ISO-8601.
    pub date: String,
}

impl ExtractionRecord {
    /// Removed span in the pre-change file.
    #[must_use]
    pub const fn removed_range(&self) -> LineRange {
        LineRange {
            start: self.start_line,
            end: self.end_line,
        }
    }

    /// Identity used to skip already-emitted work on resume.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            repo: self.repo.clone(),
            post_commit: self.post_commit.clone(),
            post_file: self.post_file.clone(),
        }
    }
}

/// `(repository, commit, file)` identity of a scanned file change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Short repository name.
    pub repo: String,
    /// Post-change commit id.
    pub post_commit: String,
    /// Post-change file path.
    pub post_file: String,
}
