use serde::{Deserialize, Serialize};

/// The line number ranges referenced by a hunk header (`@@ -a,b +c,d @@`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkRange {
    /// Starting line number for the pre-image.
    pub base_start: u32,
    /// Number of lines covered on the pre-image side.
    pub base_lines: u32,
    /// Starting line number for the post-image.
    pub head_start: u32,
    /// Number of lines covered on the post-image side.
    pub head_lines: u32,
}

impl HunkRange {
    /// Inclusive pre-image span covered by the hunk, if it covers any line.
    #[must_use]
    pub const fn base_span(&self) -> Option<(u32, u32)> {
        if self.base_lines == 0 {
            return None;
        }
        Some((
            self.base_start,
            self.base_start.saturating_add(self.base_lines - 1),
        ))
    }
}

/// Role a line plays inside a unified diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchLineKind {
    /// `diff --git`, `index`, `---`/`+++` and similar lines before the first hunk.
    FileHeader,
    /// An `@@ ... @@` hunk header.
    HunkHeader,
    /// Unchanged context line.
    Context,
    /// A newly added line.
    Addition,
    /// A deleted line.
    Deletion,
    /// `\ No newline at end of file`.
    NoNewline,
}

impl PatchLineKind {
    /// Whether the line carries file content from either side of the change.
    #[must_use]
    pub const fn is_content(self) -> bool {
        matches!(self, Self::Context | Self::Addition | Self::Deletion)
    }
}
