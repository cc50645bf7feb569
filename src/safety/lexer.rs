//! Quote- and comment-aware lexing helpers.
//!
//! Splits SQL text into statements without being fooled by semicolons inside
//! string literals, quoted identifiers, or comments, and finds the leading
//! keyword of a statement. The keyword lookup uses the sqlparser tokenizer
//! (SQLite dialect) and falls back to the region scanner when the tokenizer
//! rejects the input, e.g. on an unterminated literal.

use std::ops::Range;

use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

/// Keywords that open a SQL statement.
///
/// Used to tell a trailing statement apart from trailing prose.
const STATEMENT_KEYWORDS: &[&str] = &[
    "ALTER", "ANALYZE", "ATTACH", "BEGIN", "COMMIT", "CREATE", "DELETE", "DETACH", "DROP", "END",
    "EXPLAIN", "GRANT", "INSERT", "MERGE", "PRAGMA", "REINDEX", "RELEASE", "REPLACE", "REVOKE",
    "ROLLBACK", "SAVEPOINT", "SELECT", "SET", "TRUNCATE", "UPDATE", "UPSERT", "VACUUM", "VALUES",
    "WITH",
];

/// Kind of a lexical region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Plain SQL text outside literals and comments.
    Code,
    /// A quoted string or quoted identifier, delimiters included.
    Literal,
    /// A `--` line comment or `/* */` block comment.
    Comment,
    /// A statement-separating semicolon.
    Separator,
}

/// A contiguous byte range of the input with a single lexical kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub range: Range<usize>,
}

/// Scans `sql` into lexical regions.
///
/// Never fails: an unterminated literal or block comment runs to the end of
/// the input. All delimiters are ASCII, so every range lands on a char
/// boundary.
pub fn regions(sql: &str) -> Vec<Region> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let (kind, end) = match bytes[i] {
            b';' => (RegionKind::Separator, i + 1),
            q @ (b'\'' | b'"' | b'`') => (RegionKind::Literal, scan_quoted(bytes, i, q)),
            b'[' => (RegionKind::Literal, scan_until(bytes, i + 1, b"]")),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p);
                (RegionKind::Comment, end)
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                (RegionKind::Comment, scan_until(bytes, i + 2, b"*/"))
            }
            _ => {
                i += 1;
                continue;
            }
        };

        if code_start < i {
            out.push(Region {
                kind: RegionKind::Code,
                range: code_start..i,
            });
        }
        out.push(Region {
            kind,
            range: i..end,
        });
        i = end;
        code_start = end;
    }

    if code_start < bytes.len() {
        out.push(Region {
            kind: RegionKind::Code,
            range: code_start..bytes.len(),
        });
    }

    out
}

/// Returns the end of a quoted region starting at `start`, honouring doubled
/// quote escapes (`''`, `""`).
fn scan_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

/// Returns the index just past the first `terminator` at or after `from`.
fn scan_until(bytes: &[u8], from: usize, terminator: &[u8]) -> usize {
    if from >= bytes.len() {
        return bytes.len();
    }
    bytes[from..]
        .windows(terminator.len())
        .position(|w| w == terminator)
        .map_or(bytes.len(), |p| from + p + terminator.len())
}

/// Splits `sql` at statement-separating semicolons.
///
/// Segments keep their surrounding whitespace; a trailing separator yields a
/// trailing empty segment.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for region in regions(sql) {
        if region.kind == RegionKind::Separator {
            segments.push(&sql[start..region.range.start]);
            start = region.range.end;
        }
    }
    segments.push(&sql[start..]);
    segments
}

/// Returns true if `segment` holds anything besides whitespace and comments.
pub fn has_code(segment: &str) -> bool {
    regions(segment).iter().any(|r| match r.kind {
        RegionKind::Code => !segment[r.range.clone()].trim().is_empty(),
        RegionKind::Literal => true,
        RegionKind::Comment | RegionKind::Separator => false,
    })
}

/// Counts the statements in `sql` that contain actual code.
pub fn count_statements(sql: &str) -> usize {
    split_statements(sql)
        .into_iter()
        .filter(|s| has_code(s))
        .count()
}

/// Returns `sql` with the contents of every literal blanked out.
///
/// Byte offsets are preserved. Comments and separators are kept so callers
/// can look for them in the result.
pub fn mask_literals(sql: &str) -> String {
    let mut masked = String::with_capacity(sql.len());
    for region in regions(sql) {
        let text = &sql[region.range.clone()];
        match region.kind {
            RegionKind::Literal => masked.extend(std::iter::repeat(' ').take(text.len())),
            _ => masked.push_str(text),
        }
    }
    masked
}

/// Returns `sql` with literals and comments blanked out, offsets preserved.
///
/// What remains is the text SQLite will actually parse as keywords.
pub fn mask_non_code(sql: &str) -> String {
    let mut masked = String::with_capacity(sql.len());
    for region in regions(sql) {
        let text = &sql[region.range.clone()];
        match region.kind {
            RegionKind::Literal | RegionKind::Comment => {
                masked.extend(std::iter::repeat(' ').take(text.len()))
            }
            RegionKind::Code | RegionKind::Separator => masked.push_str(text),
        }
    }
    masked
}

/// Byte offset just past the last code or literal in `sql`.
///
/// Trailing whitespace, comments and separators lie beyond it.
pub fn code_end(sql: &str) -> usize {
    regions(sql)
        .iter()
        .rev()
        .find_map(|r| match r.kind {
            RegionKind::Literal => Some(r.range.end),
            RegionKind::Code => {
                let text = &sql[r.range.clone()];
                let trimmed = text.trim_end();
                (!trimmed.is_empty()).then(|| r.range.start + trimmed.len())
            }
            RegionKind::Comment | RegionKind::Separator => None,
        })
        .unwrap_or(0)
}

/// Returns the leading keyword of `sql`, uppercased.
///
/// Whitespace and comments are skipped. Returns `None` when the first
/// meaningful token is not a bare word (a literal, a parenthesis, ...).
pub fn first_keyword(sql: &str) -> Option<String> {
    let dialect = SQLiteDialect {};
    match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens
            .into_iter()
            .find_map(|token| match token {
                Token::Whitespace(_) => None,
                Token::Word(word) if word.quote_style.is_none() => {
                    Some(Some(word.value.to_uppercase()))
                }
                _ => Some(None),
            })
            .flatten(),
        Err(e) => {
            debug!("Tokenizer rejected input, scanning regions instead: {}", e);
            scan_first_word(sql)
        }
    }
}

/// Region-based fallback for [`first_keyword`].
fn scan_first_word(sql: &str) -> Option<String> {
    for region in regions(sql) {
        match region.kind {
            RegionKind::Comment => continue,
            RegionKind::Code => {
                let text = sql[region.range].trim_start();
                if text.is_empty() {
                    continue;
                }
                let word: String = text
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                return (!word.is_empty()).then(|| word.to_uppercase());
            }
            RegionKind::Literal | RegionKind::Separator => return None,
        }
    }
    None
}

/// Returns true if `segment` starts with a keyword that opens a statement.
pub fn starts_like_statement(segment: &str) -> bool {
    first_keyword(segment).is_some_and(|kw| STATEMENT_KEYWORDS.contains(&kw.as_str()))
}

/// Returns true if `segment` is SQL rather than prose: it opens with a
/// statement keyword and the SQLite dialect parser accepts it.
///
/// "Explain: this lists the rooms." starts like a statement but does not
/// parse, so it reads as prose.
pub fn reads_as_statement(segment: &str) -> bool {
    if !starts_like_statement(segment) {
        return false;
    }
    match Parser::parse_sql(&SQLiteDialect {}, segment) {
        Ok(statements) => !statements.is_empty(),
        Err(e) => {
            debug!("Trailing segment does not parse as SQL: {}", e);
            false
        }
    }
}
