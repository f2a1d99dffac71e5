//! Inserts and removes the sentinel lines around an extracted region.
//!
//! Markers are written at column zero using the line ending of the file's
//! first line. When the marked region ends on a final line without a
//! terminator, the end marker becomes the new unterminated last line so that
//! [`strip_markers`] can restore the original bytes.

use liftscan_api::LineRange;
use regex::Regex;
use tracing::warn;

use crate::braces::BraceDepth;
use crate::scan::declaration_pattern;

/// Line inserted before the first marked line.
pub const START_MARKER: &str = "// Extraction Starts Here";
/// Line inserted after the last marked line.
pub const END_MARKER: &str = "// Extraction Ends Here";

/// Mark lines `start..=end` (1-based) of `text`.
///
/// `end` is clamped to the last line. The text is returned unchanged when
/// `start` is zero, lies beyond the last line, or exceeds `end`.
#[must_use]
pub fn annotate_range(text: &str, start: u32, end: u32) -> String {
    let count = text.split_inclusive('\n').count();
    let (Ok(first), Ok(last)) = (usize::try_from(start), usize::try_from(end)) else {
        return text.to_owned();
    };
    if first == 0 || first > count || first > last {
        return text.to_owned();
    }
    insert_markers(text, first - 1, last.min(count) - 1)
}

/// Find the declaration of `name` and the line that closes its body.
#[must_use]
pub fn locate_function(text: &str, name: &str) -> Option<LineRange> {
    let pattern = format!(r"(?m)^[ \t]*{}", declaration_pattern(&regex::escape(name)));
    let declaration = Regex::new(&pattern).ok()?.find(text)?;

    let first = text.get(..declaration.start())?.matches('\n').count();
    let mut depth = BraceDepth::new();
    let last = text
        .lines()
        .enumerate()
        .skip(first)
        .find_map(|(index, line)| depth.feed(line).then_some(index))?;

    LineRange::new(line_number(first)?, line_number(last)?)
}

/// Mark the function `name` from its declaration line to its closing line.
///
/// Returns the text unchanged, with a warning, when the function cannot be
/// found or its body never closes.
#[must_use]
pub fn annotate_function(text: &str, name: &str) -> String {
    match locate_function(text, name) {
        Some(range) => annotate_range(text, range.start, range.end),
        None => {
            warn!(function = name, "function not found, leaving text unmarked");
            text.to_owned()
        }
    }
}

/// Remove every sentinel line inserted by this module.
#[must_use]
pub fn strip_markers(text: &str) -> String {
    let ending = line_ending(text);
    let mut stripped = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if content != START_MARKER && content != END_MARKER {
            stripped.push_str(line);
            continue;
        }
        if !line.ends_with('\n') && stripped.ends_with(ending) {
            stripped.truncate(stripped.len() - ending.len());
        }
    }

    stripped
}

fn insert_markers(text: &str, first: usize, last: usize) -> String {
    let ending = line_ending(text);
    let mut marked = String::with_capacity(
        text.len() + START_MARKER.len() + END_MARKER.len() + 2 * ending.len(),
    );

    for (index, line) in text.split_inclusive('\n').enumerate() {
        if index == first {
            marked.push_str(START_MARKER);
            marked.push_str(ending);
        }
        marked.push_str(line);
        if index == last {
            if line.ends_with('\n') {
                marked.push_str(END_MARKER);
                marked.push_str(ending);
            } else {
                marked.push_str(ending);
                marked.push_str(END_MARKER);
            }
        }
    }

    marked
}

fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(index) if text[..index].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

fn line_number(index: usize) -> Option<u32> {
    u32::try_from(index + 1).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE: &str = "one\ntwo\nthree\nfour\nfive\n";

    const SOURCE: &str = concat!(
        "use std::io;\n",
        "\n",
        "/// Reads config.\n",
        "pub(crate) fn load_config<P: AsRef<Path>>(path: P) -> io::Result<String> {\n",
        "    let text = std::fs::read_to_string(path)?;\n",
        "    if text.is_empty() {\n",
        "        return Ok(String::new());\n",
        "    }\n",
        "    Ok(text)\n",
        "}\n",
        "\n",
        "fn main() {}\n",
    );

    #[test]
    fn marks_inner_range() {
        let marked = annotate_range(FIVE, 2, 3);
        let lines: Vec<&str> = marked.lines().collect();
        assert_eq!(
            lines,
            ["one", START_MARKER, "two", "three", END_MARKER, "four", "five"]
        );
    }

    #[test]
    fn start_beyond_text_is_unchanged() {
        assert_eq!(annotate_range(FIVE, 6, 9), FIVE);
        assert_eq!(annotate_range(FIVE, 0, 2), FIVE);
        assert_eq!(annotate_range("", 1, 1), "");
    }

    #[test]
    fn end_is_clamped_to_last_line() {
        let marked = annotate_range(FIVE, 4, 40);
        assert!(marked.ends_with(&format!("five\n{END_MARKER}\n")));
        assert_eq!(strip_markers(&marked), FIVE);
    }

    #[test]
    fn unterminated_last_line_round_trips() {
        let text = "fn a() {\n    b();\n}";
        let marked = annotate_range(text, 2, 3);
        assert_eq!(
            marked,
            format!("fn a() {{\n{START_MARKER}\n    b();\n}}\n{END_MARKER}")
        );
        assert_eq!(strip_markers(&marked), text);
    }

    #[test]
    fn crlf_endings_are_preserved() {
        let text = "a\r\nb\r\nc\r\n";
        let marked = annotate_range(text, 1, 2);
        assert_eq!(
            marked,
            format!("{START_MARKER}\r\na\r\nb\r\n{END_MARKER}\r\nc\r\n")
        );
        assert_eq!(strip_markers(&marked), text);
    }

    #[test]
    fn locates_function_by_name() {
        assert_eq!(
            locate_function(SOURCE, "load_config"),
            LineRange::new(4, 10)
        );
        assert_eq!(locate_function(SOURCE, "main"), LineRange::new(12, 12));
        assert_eq!(locate_function(SOURCE, "load"), None);
    }

    #[test]
    fn annotates_function_by_name() {
        let marked = annotate_function(SOURCE, "load_config");
        let lines: Vec<&str> = marked.lines().collect();
        assert_eq!(lines[3], START_MARKER);
        assert!(lines[4].starts_with("pub(crate) fn load_config"));
        assert_eq!(lines[10], "}");
        assert_eq!(lines[11], END_MARKER);
        assert_eq!(strip_markers(&marked), SOURCE);
    }

    #[test]
    fn missing_function_leaves_text_unchanged() {
        assert_eq!(annotate_function(SOURCE, "absent"), SOURCE);
        let unterminated = "fn open() {\n    loop {\n";
        assert_eq!(annotate_function(unterminated, "open"), unterminated);
    }

    #[test]
    fn strip_without_markers_is_identity() {
        assert_eq!(strip_markers(SOURCE), SOURCE);
        assert_eq!(strip_markers("no newline"), "no newline");
    }
}
