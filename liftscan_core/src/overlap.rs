//! Scores how much of the removed code reappears in a new function body.

use std::collections::HashSet;
use std::fmt;

use liftscan_api::PatchLineKind;
use serde::Serialize;

use crate::patch;

/// Percentage (0..=100) of removed lines found verbatim in a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OverlapScore(u8);

impl OverlapScore {
    /// Minimum score for a candidate to be accepted (inclusive).
    pub const THRESHOLD: Self = Self(60);

    /// Build a score, clamping to 100.
    #[must_use]
    pub const fn new(percent: u8) -> Self {
        if percent > 100 {
            Self(100)
        } else {
            Self(percent)
        }
    }

    /// The percentage value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether the score meets [`OverlapScore::THRESHOLD`].
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        self.0 >= Self::THRESHOLD.0
    }
}

impl fmt::Display for OverlapScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Deleted lines of `patch`, marker stripped and trimmed, blanks dropped.
#[must_use]
pub fn removed_lines(patch: &str) -> Vec<String> {
    patch::lines(patch)
        .filter(|line| line.kind == PatchLineKind::Deletion)
        .map(|line| line.content().trim())
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `floor(matches * 100 / removed.len())`, or zero when nothing was removed.
///
/// A removed line matches when its trimmed text equals any trimmed body line.
#[must_use]
pub fn score<R, B>(removed: &[R], body: &[B]) -> OverlapScore
where
    R: AsRef<str>,
    B: AsRef<str>,
{
    if removed.is_empty() {
        return OverlapScore(0);
    }

    let body_lines: HashSet<&str> = body.iter().map(|line| line.as_ref().trim()).collect();
    let matches = removed
        .iter()
        .filter(|line| body_lines.contains(line.as_ref().trim()))
        .count();

    let percent = matches * 100 / removed.len();
    OverlapScore::new(u8::try_from(percent).unwrap_or(100))
}
