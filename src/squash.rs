//! Squash generated code onto a single line.
//!
//! Generated code is appended to the tag's own line, so it must never
//! carry a newline into the file:
//!
//! 1. Full-line comments are dropped
//! 2. Leading indentation is removed
//! 3. Remaining lines are joined with single spaces

use regex::Regex;
use std::sync::LazyLock;

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[[:space:]]*#").unwrap());
static RE_BLANK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[[:space:]]*$").unwrap());
static RE_LEADING_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[[:space:]]+").unwrap());

/// Returns true if the line contributes nothing to squashed output.
fn is_droppable(line: &str) -> bool {
    RE_COMMENT.is_match(line) || RE_BLANK.is_match(line)
}

/// Collapse multi-line code into one line.
pub fn squash(code: &str) -> String {
    code.lines()
        .filter(|line| !is_droppable(line))
        .map(|line| RE_LEADING_WS.replace(line, ""))
        .collect::<Vec<_>>()
        .join(" ")
}
