//! Normalization of raw LLM output into a single SQL statement.
//!
//! The model is asked for bare SQL but routinely wraps it in markdown fences,
//! prefixes it with "SQL:" or a sentence of explanation, or appends a
//! trailing semicolon and some prose. Normalization strips all of that on a
//! best-effort basis and never fails; text in which no SQL can be found is
//! returned trimmed and left for the validator to reject.

use std::sync::LazyLock;

use regex::Regex;

use super::lexer;

/// Verbose prefixes models put in front of the statement.
const PREFIXES: &[&str] = &[
    "SQLQuery:",
    "SQL Query:",
    "SQL:",
    "Query:",
    "Consulta SQL:",
    "Consulta:",
    "Here is the SQL query:",
    "La consulta SQL es:",
    "La consulta es:",
    "Answer:",
    "Respuesta:",
];

/// Upper bound on prefix-stripping passes.
const MAX_PREFIX_PASSES: usize = 8;

/// First fenced code block, optionally tagged `sql`.
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("valid fence regex"));

/// First inline code span.
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid inline code regex"));

/// Start of a read query: `SELECT`, or `WITH` shaped like a common table
/// expression (`WITH [RECURSIVE] name [(cols)] AS [[NOT] MATERIALIZED] (`).
/// The name may be quoted with `"`, backticks or brackets. A bare English
/// "with" does not count.
static READ_QUERY_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bselect\b|\bwith\s+(?:recursive\s+)?(?:"[^"]*"|`[^`]*`|\[[^\]]*\]|[^\s("`\[]+)\s*(?:\([^)]*\)\s*)?as(?:\s+(?:not\s+)?materialized)?\s*\("#,
    )
    .expect("valid read query regex")
});

/// Normalizes raw model output into a single SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    /// Keep only the first statement when several are present.
    ///
    /// When false, trailing segments are dropped only if they read as prose;
    /// a trailing statement is left in place so validation can reject it.
    pub isolate_first_statement: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            isolate_first_statement: true,
        }
    }
}

impl Normalizer {
    /// Creates a normalizer.
    pub fn new(isolate_first_statement: bool) -> Self {
        Self {
            isolate_first_statement,
        }
    }

    /// Runs every normalization step in order.
    pub fn normalize(&self, raw: &str) -> String {
        let text = raw.trim();
        if text.is_empty() {
            return String::new();
        }

        let text = extract_code_block(text);
        let text = strip_prefixes(text);
        let text = from_first_read_keyword(text);
        let text = drop_trailing_semicolons(text);

        if self.isolate_first_statement {
            first_statement(text).to_string()
        } else {
            drop_trailing_prose(text).to_string()
        }
    }
}

/// Normalizes raw model output, keeping only the first statement.
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}

/// Returns the SQL inside the first fenced block, or inside an inline code
/// span that holds a read query. Falls back to the input.
fn extract_code_block(text: &str) -> &str {
    if let Some(inner) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        let inner = inner.as_str().trim();
        return match READ_QUERY_START.find(inner) {
            Some(m) => inner[m.start()..].trim(),
            None => inner,
        };
    }

    if let Some(inner) = INLINE_CODE.captures(text).and_then(|c| c.get(1)) {
        let inner = inner.as_str().trim();
        if READ_QUERY_START.is_match(inner) {
            return inner;
        }
    }

    text
}

/// Strips known prefixes, repeatedly, so stacked prefixes all go.
fn strip_prefixes(mut text: &str) -> &str {
    for _ in 0..MAX_PREFIX_PASSES {
        let Some(prefix) = PREFIXES.iter().find(|p| {
            text.get(..p.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(p))
        }) else {
            break;
        };
        text = text[prefix.len()..].trim();
    }
    text
}

/// Discards everything before the first read-query keyword.
fn from_first_read_keyword(text: &str) -> &str {
    match READ_QUERY_START.find(text) {
        Some(m) => text[m.start()..].trim(),
        None => text.trim(),
    }
}

fn drop_trailing_semicolons(text: &str) -> &str {
    text.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Keeps the text before the first statement separator.
fn first_statement(text: &str) -> &str {
    lexer::split_statements(text)
        .first()
        .map_or(text, |s| s.trim())
}

/// Drops trailing segments when none of them reads as a statement.
fn drop_trailing_prose(text: &str) -> &str {
    let segments = lexer::split_statements(text);
    let Some((head, tail)) = segments.split_first() else {
        return text;
    };

    let tail_has_statement = tail
        .iter()
        .filter(|s| lexer::has_code(s))
        .any(|s| lexer::reads_as_statement(s));

    if tail_has_statement {
        text
    } else {
        head.trim()
    }
}
