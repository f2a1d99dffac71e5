//! Line-level view of one file's unified diff.
//!
//! Lines before the first `@@` header are file headers (`diff --git`,
//! `index`, `---`, `+++`), so a removed line that happens to start with `--`
//! is never mistaken for the pre-image path header.

use std::sync::LazyLock;

use liftscan_api::{HunkRange, PatchLineKind};
use regex::Regex;

#[allow(clippy::expect_used)]
static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header pattern")
});

/// A classified line of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchLine<'a> {
    /// Role of the line.
    pub kind: PatchLineKind,
    /// Line text including its diff marker, without the line terminator.
    pub raw: &'a str,
    /// Byte offset of the line start within the patch.
    pub offset: usize,
}

impl<'a> PatchLine<'a> {
    /// Line text with the one-character diff marker removed.
    ///
    /// Header lines are returned unchanged.
    #[must_use]
    pub fn content(&self) -> &'a str {
        if self.kind.is_content() {
            self.raw.get(1..).unwrap_or("")
        } else {
            self.raw
        }
    }
}

/// Iterator over classified patch lines.
#[derive(Debug, Clone)]
pub struct PatchLines<'a> {
    rest: &'a str,
    offset: usize,
    in_hunk: bool,
}

impl<'a> Iterator for PatchLines<'a> {
    type Item = PatchLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let (segment, remainder) = match self.rest.find('\n') {
            Some(index) => self.rest.split_at(index + 1),
            None => (self.rest, ""),
        };
        let raw = segment.trim_end_matches(['\n', '\r']);
        let offset = self.offset;
        self.offset += segment.len();
        self.rest = remainder;

        let kind = if raw.starts_with("@@") {
            self.in_hunk = true;
            PatchLineKind::HunkHeader
        } else if !self.in_hunk {
            PatchLineKind::FileHeader
        } else if raw.starts_with("diff --git ") {
            self.in_hunk = false;
            PatchLineKind::FileHeader
        } else {
            match raw.as_bytes().first() {
                Some(b'+') => PatchLineKind::Addition,
                Some(b'-') => PatchLineKind::Deletion,
                Some(b'\\') => PatchLineKind::NoNewline,
                _ => PatchLineKind::Context,
            }
        };

        Some(PatchLine { kind, raw, offset })
    }
}

/// Classify every line of `patch`.
#[must_use]
pub fn lines(patch: &str) -> PatchLines<'_> {
    PatchLines {
        rest: patch,
        offset: 0,
        in_hunk: false,
    }
}

/// Classify the lines of `patch` starting at byte `offset`.
///
/// `offset` must point at the start of a line inside a hunk.
#[must_use]
pub fn lines_from(patch: &str, offset: usize) -> PatchLines<'_> {
    PatchLines {
        rest: patch.get(offset..).unwrap_or(""),
        offset,
        in_hunk: true,
    }
}

/// Parse an `@@ -a,b +c,d @@` header. Omitted lengths default to 1.
#[must_use]
pub fn parse_hunk_header(line: &str) -> Option<HunkRange> {
    let captures = HUNK_HEADER_RE.captures(line)?;
    let number = |index: usize, default: Option<u32>| {
        captures
            .get(index)
            .map_or(default, |value| value.as_str().parse().ok())
    };

    Some(HunkRange {
        base_start: number(1, None)?,
        base_lines: number(2, Some(1))?,
        head_start: number(3, None)?,
        head_lines: number(4, Some(1))?,
    })
}

/// A hunk header together with the lines of its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk<'a> {
    /// Parsed header ranges.
    pub range: HunkRange,
    /// Body lines following the header.
    pub lines: Vec<PatchLine<'a>>,
}

impl Hunk<'_> {
    /// Whether any body line is a deletion.
    #[must_use]
    pub fn has_deletion(&self) -> bool {
        self.lines
            .iter()
            .any(|line| line.kind == PatchLineKind::Deletion)
    }
}

/// Group the patch into hunks. Lines under an unparseable header are dropped.
#[must_use]
pub fn hunks(patch: &str) -> Vec<Hunk<'_>> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk<'_>> = None;

    for line in lines(patch) {
        match line.kind {
            PatchLineKind::HunkHeader => {
                hunks.extend(current.take());
                current = parse_hunk_header(line.raw).map(|range| Hunk {
                    range,
                    lines: Vec::new(),
                });
            }
            PatchLineKind::FileHeader => {
                hunks.extend(current.take());
            }
            _ => {
                if let Some(hunk) = current.as_mut() {
                    hunk.lines.push(line);
                }
            }
        }
    }

    hunks.extend(current);
    hunks
}
