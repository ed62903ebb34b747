//! Lines of output, as produced by commands and consumed by whatever is rendering them.
//!
//! Rendering itself (colors, scrollback, wrapping) is not handled here; this is just the typed data that crosses the
//! boundary between the engine and the display.

use std::fmt;

/// What sort of line this is, so the display can style it appropriately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Regular command output
    Output,
    /// Something went wrong
    Error,
    /// Shell chatter that isn't the command's own output, e.g. connection notices
    Info,
}

/// A single line of output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub text: String,
}

impl Line {
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Output,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Error,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Info,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == LineKind::Error
    }

    /// Split a block of text into output lines. An empty block produces no lines at all.
    pub fn block(text: &str) -> Vec<Line> {
        if text.is_empty() {
            return vec![];
        }
        text.lines().map(Line::output).collect()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn block_splits_lines() {
        let lines = Line::block("one\ntwo\n");
        assert_eq!(lines, vec![Line::output("one"), Line::output("two")]);
    }

    #[test]
    fn empty_block_is_empty() {
        assert!(Line::block("").is_empty());
    }
}
