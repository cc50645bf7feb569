//! Row-count bound enforcement.
//!
//! Textual heuristic, not a parser: any `LIMIT <n>` in the statement's code
//! counts as a bound, even one inside a subquery. Text inside literals and
//! comments never does.

use std::sync::LazyLock;

use regex::Regex;

use super::lexer;

static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+\b").expect("valid limit regex"));

/// Returns true if `statement` already carries a `LIMIT <n>` clause.
pub fn has_bound(statement: &str) -> bool {
    LIMIT_CLAUSE.is_match(&lexer::mask_non_code(statement))
}

/// Ensures `statement` is bounded, appending `LIMIT default_bound` if needed.
///
/// The bound goes right after the last code, so trailing semicolons and
/// comments are dropped rather than left to swallow it.
pub fn enforce_bound(statement: &str, default_bound: u32) -> String {
    if has_bound(statement) {
        return statement.to_string();
    }

    let body = &statement[..lexer::code_end(statement)];
    if body.is_empty() {
        return format!("LIMIT {default_bound}");
    }
    format!("{body} LIMIT {default_bound}")
}
