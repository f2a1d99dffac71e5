//! Structural flags for a detected function.

use serde::Serialize;

use crate::scan::SignatureMatch;

/// Flags recorded alongside an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// `<` and `>` appear after the function name on its declaration line.
    pub generic: bool,
    /// The declaration carries `async`.
    pub is_async: bool,
}

/// Classify the declaration matched by `signature` within `patch`.
#[must_use]
pub fn classify(patch: &str, signature: &SignatureMatch) -> Classification {
    let tail = patch.get(signature.name_end..).unwrap_or("");
    let line = tail.split_once('\n').map_or(tail, |(line, _)| line);

    Classification {
        generic: line.contains('<') && line.contains('>'),
        is_async: signature.is_async,
    }
}
