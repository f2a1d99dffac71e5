//! Running brace depth used to find the lexical end of a block.
//!
//! Braces inside comments and string literals are counted like any other.

/// Tracks unmatched `{` across a sequence of lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BraceDepth {
    depth: i64,
    opened: bool,
}

impl BraceDepth {
    /// A walker that has not seen any line yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: 0,
            opened: false,
        }
    }

    /// Account for one line; returns `true` when it closes the block.
    ///
    /// A block closes on the first line after which depth has been positive
    /// at least once and is back at zero or below.
    pub fn feed(&mut self, line: &str) -> bool {
        for ch in line.chars() {
            match ch {
                '{' => self.depth += 1,
                '}' => self.depth -= 1,
                _ => {}
            }
            if self.depth > 0 {
                self.opened = true;
            }
        }
        self.is_closed()
    }

    /// Whether the block has opened and closed again.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.opened && self.depth <= 0
    }

    /// Current depth.
    #[must_use]
    pub const fn depth(&self) -> i64 {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_on_matching_line() {
        let mut depth = BraceDepth::new();
        assert!(!depth.feed("fn foo() {"));
        assert!(!depth.feed("    if x { y(); }"));
        assert!(depth.feed("}"));
    }

    #[test]
    fn single_line_block_closes_immediately() {
        let mut depth = BraceDepth::new();
        assert!(depth.feed("fn noop() {}"));
    }

    #[test]
    fn leading_close_brace_does_not_count_as_closed() {
        let mut depth = BraceDepth::new();
        assert!(!depth.feed("} // stray"));
        assert_eq!(depth.depth(), -1);
        assert!(!depth.feed("fn after() {"));
    }
}
