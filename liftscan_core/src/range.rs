//! Recovers the pre-image line span touched by deletions.

use liftscan_api::LineRange;

use crate::patch;

/// Envelope of the pre-image spans of every hunk that deletes a line.
///
/// Disjoint spans are merged into one covering range, so unrelated lines
/// between two deleting hunks are included.
#[must_use]
pub fn removed_range(patch: &str) -> Option<LineRange> {
    patch::hunks(patch)
        .iter()
        .filter(|hunk| hunk.has_deletion())
        .filter_map(|hunk| hunk.range.base_span())
        .filter_map(|(start, end)| LineRange::new(start, end))
        .reduce(LineRange::envelope)
}
