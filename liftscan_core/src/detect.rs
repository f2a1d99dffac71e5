//! Runs the detection stages over one file patch.

use liftscan_api::LineRange;
use serde::Serialize;
use tracing::debug;

use crate::body::extract_body;
use crate::classify::classify;
use crate::overlap::{self, OverlapScore};
use crate::range::removed_range;
use crate::scan::find_new_function;

/// Why a file change did not yield an extraction.
///
/// Rejections are expected outcomes, not failures of the scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// No added line declares a function with a body.
    #[error("no new function declared in patch")]
    NoCandidate,
    /// The patch ended before the new function's closing brace.
    #[error("patch ends before `{function}` closes")]
    MalformedPatch {
        /// Name of the unterminated function.
        function: String,
    },
    /// Too few removed lines reappear in the new body.
    #[error("`{function}` reuses only {score} of the removed lines")]
    LowOverlap {
        /// Candidate function name.
        function: String,
        /// Score that fell below the threshold.
        score: OverlapScore,
    },
    /// No hunk removes anything, so there is no pre-image span.
    #[error("no removed range for `{function}`")]
    NoRemovedRange {
        /// Candidate function name.
        function: String,
    },
    /// Record fields violate an invariant.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// Violated invariant.
        reason: String,
    },
}

/// A function that plausibly absorbed removed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionCandidate {
    /// Declared name of the new function.
    pub function: String,
    /// Declared `async`.
    pub is_async: bool,
    /// Signature carries generic parameters.
    pub generic: bool,
    /// Reconstructed source lines of the new function.
    pub body: Vec<String>,
    /// Overlap between removed lines and `body`.
    pub score: OverlapScore,
    /// Pre-image span of the removals.
    pub removed_range: Option<LineRange>,
}

/// Detect an extract-method candidate in `patch`.
///
/// Stages run in order (declaration, body, overlap, removed range,
/// classification) and the first failing stage decides the rejection.
///
/// # Errors
///
/// Returns the [`Rejection`] of the first stage that fails.
pub fn detect(patch: &str) -> Result<ExtractionCandidate, Rejection> {
    let signature = find_new_function(patch).ok_or(Rejection::NoCandidate)?;
    let body = extract_body(patch, &signature)?;

    let removed = overlap::removed_lines(patch);
    let score = overlap::score(&removed, &body);
    if !score.is_accepted() {
        return Err(Rejection::LowOverlap {
            function: signature.name,
            score,
        });
    }

    let Some(range) = removed_range(patch) else {
        return Err(Rejection::NoRemovedRange {
            function: signature.name,
        });
    };

    let flags = classify(patch, &signature);
    debug!(
        function = %signature.name,
        %score,
        start = range.start,
        end = range.end,
        "extraction candidate"
    );

    Ok(ExtractionCandidate {
        function: signature.name,
        is_async: flags.is_async,
        generic: flags.generic,
        body,
        score,
        removed_range: Some(range),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRACTION: &str = concat!(
        "diff --git a/src/lib.rs b/src/lib.rs\n",
        "--- a/src/lib.rs\n",
        "+++ b/src/lib.rs\n",
        "@@ -1,7 +1,9 @@\n",
        " pub fn run(items: &[u32]) -> u32 {\n",
        "-    let mut total = 0;\n",
        "-    for item in items {\n",
        "-        total += item;\n",
        "-    }\n",
        "-    total\n",
        "+    sum(items)\n",
        "+}\n",
        "+\n",
        "+fn sum<T: Copy>(items: &[u32]) -> u32 {\n",
        "+    let mut total = 0;\n",
        "+    for item in items {\n",
        "+        total += item;\n",
        "+    }\n",
        "+    total\n",
        " }\n",
    );

    #[test]
    fn detects_extracted_helper() {
        let candidate = detect(EXTRACTION).expect("candidate");
        assert_eq!(candidate.function, "sum");
        assert!(candidate.generic);
        assert!(!candidate.is_async);
        assert_eq!(candidate.score.value(), 100);
        assert_eq!(candidate.removed_range, LineRange::new(1, 7));
        assert_eq!(candidate.body.last().map(String::as_str), Some("}"));
    }

    #[test]
    fn no_declaration_is_no_candidate() {
        let patch = "@@ -1,2 +1,2 @@\n-    a();\n+    b();\n";
        assert_eq!(detect(patch), Err(Rejection::NoCandidate));
    }

    #[test]
    fn unrelated_new_function_has_low_overlap() {
        let patch = concat!(
            "@@ -4,2 +4,4 @@\n",
            "-    legacy();\n",
            "-    cleanup();\n",
            "+fn fresh() {\n",
            "+    cleanup();\n",
            "+}\n",
        );
        assert_eq!(
            detect(patch),
            Err(Rejection::LowOverlap {
                function: "fresh".into(),
                score: OverlapScore::new(50),
            })
        );
    }

    #[test]
    fn pure_addition_scores_zero() {
        let patch = "@@ -3,0 +4,3 @@\n+fn added() {\n+    work();\n+}\n";
        assert!(matches!(
            detect(patch),
            Err(Rejection::LowOverlap { score, .. }) if score.value() == 0
        ));
    }

    #[test]
    fn malformed_patch_stops_before_scoring() {
        let patch = "@@ -1,1 +1,2 @@\n-    gone();\n+fn open() {\n+    gone();\n";
        assert_eq!(
            detect(patch),
            Err(Rejection::MalformedPatch {
                function: "open".into()
            })
        );
    }
}
