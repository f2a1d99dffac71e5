//! Reconstructs a new function's source from the lines of a patch.

use liftscan_api::PatchLineKind;

use crate::braces::BraceDepth;
use crate::detect::Rejection;
use crate::patch;
use crate::scan::SignatureMatch;

/// Extract the body of the function whose declaration `signature` matched.
///
/// Deleted lines are skipped; added and context lines lose their diff marker
/// and trailing whitespace. Extraction ends on the line that brings the brace
/// depth back to zero, which is included.
///
/// # Errors
///
/// Returns [`Rejection::MalformedPatch`] when the patch ends before the
/// function closes. No partial body is returned.
pub fn extract_body(patch: &str, signature: &SignatureMatch) -> Result<Vec<String>, Rejection> {
    let mut depth = BraceDepth::new();
    let mut body = Vec::new();

    for line in patch::lines_from(patch, signature.line_start) {
        match line.kind {
            PatchLineKind::Addition | PatchLineKind::Context => {}
            PatchLineKind::FileHeader => break,
            PatchLineKind::Deletion | PatchLineKind::HunkHeader | PatchLineKind::NoNewline => {
                continue
            }
        }

        let text = line.content().trim_end();
        body.push(text.to_owned());
        if depth.feed(text) {
            return Ok(body);
        }
    }

    Err(Rejection::MalformedPatch {
        function: signature.name.clone(),
    })
}
