//! Locates the first added function declaration in a patch.

use std::sync::LazyLock;

use regex::Regex;

/// Declaration grammar shared with the annotator: optional visibility,
/// optional `async`, `fn`, the identifier, generic text, a parameter list and
/// a body-opening `{` on the same line.
///
/// Group 1 captures `async`, group 2 the identifier.
pub(crate) fn declaration_pattern(identifier: &str) -> String {
    format!(
        r"(?:pub(?:\([^)\n]*\))?[ \t]+)?(async[ \t]+)?fn[ \t]+({identifier})\b[^\n(]*\([^\n]*?\{{"
    )
}

#[allow(clippy::expect_used)]
static NEW_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?m)^\+[ \t]*{}", declaration_pattern(r"\w+"));
    Regex::new(&pattern).expect("new function pattern")
});

/// A textual match of an added function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch {
    /// Byte offset of the start of the declaration line.
    pub line_start: usize,
    /// Byte offset just past the identifier.
    pub name_end: usize,
    /// Byte offset just past the body-opening `{`.
    pub end: usize,
    /// Declared function name.
    pub name: String,
    /// Declaration carries `async`.
    pub is_async: bool,
}

/// Find the first added line shaped like a function declaration.
///
/// Later declarations in the same patch are ignored.
#[must_use]
pub fn find_new_function(patch: &str) -> Option<SignatureMatch> {
    let captures = NEW_FUNCTION_RE.captures(patch)?;
    let whole = captures.get(0)?;
    let name = captures.get(2)?;

    Some(SignatureMatch {
        line_start: whole.start(),
        name_end: name.end(),
        end: whole.end(),
        name: name.as_str().to_owned(),
        is_async: captures.get(1).is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_plain_function() {
        let patch = "@@ -1,2 +1,5 @@\n fn main() {\n+fn helper(x: u32) -> u32 {\n+    x + 1\n+}\n";
        let found = find_new_function(patch).expect("match");
        assert_eq!(found.name, "helper");
        assert!(!found.is_async);
        assert_eq!(&patch[found.line_start..found.end], "+fn helper(x: u32) -> u32 {");
        assert_eq!(&patch[found.name_end..found.name_end + 1], "(");
    }

    #[test]
    fn captures_visibility_and_async() {
        let patch = "@@ -1 +1,3 @@\n+    pub(crate) async fn load<T: Default>(path: &str) -> T {\n";
        let found = find_new_function(patch).expect("match");
        assert_eq!(found.name, "load");
        assert!(found.is_async);
    }

    #[test]
    fn ignores_context_and_removed_declarations() {
        let patch = "@@ -1,2 +1,1 @@\n fn kept() {\n-fn gone() {\n";
        assert!(find_new_function(patch).is_none());
    }

    #[test]
    fn requires_body_on_same_line() {
        let patch = "@@ -1 +1,2 @@\n+fn declared(x: u32)\n+where T: Copy {\n";
        assert!(find_new_function(patch).is_none());
    }

    #[test]
    fn only_first_declaration_is_reported() {
        let patch = "@@ -1 +1,4 @@\n+fn first() {\n+}\n+fn second() {\n+}\n";
        assert_eq!(find_new_function(patch).map(|m| m.name), Some("first".into()));
    }
}
