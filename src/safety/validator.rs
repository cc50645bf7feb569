//! Read-only safety validation for a single SQL statement.
//!
//! Two layers: a statement-type gate on the leading keyword, and a blocklist
//! scan over the whole text that catches mutation keywords smuggled into an
//! otherwise valid-looking read query.

use std::sync::LazyLock;

use regex::Regex;

use super::lexer;
use super::{Verdict, VerdictReason};

/// Mutation, definition and attach verbs that are never allowed.
static FORBIDDEN_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:INSERT|UPDATE|DELETE|DROP|ALTER|TRUNCATE|CREATE|ATTACH|DETACH)\b")
        .expect("valid blocklist regex")
});

/// Separator and comment markers checked outside string literals.
const FORBIDDEN_MARKERS: &[&str] = &[";", "--", "/*"];

/// Validates statements against the read-only policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    /// Accept `WITH` as a leading keyword in strict mode.
    pub allow_cte: bool,
    /// Reject `;`, `--` and `/*` appearing outside string literals.
    pub block_comment_markers: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            allow_cte: true,
            block_comment_markers: true,
        }
    }
}

impl Validator {
    /// Validates `statement`. Rules run in order; the first failure wins.
    pub fn validate(&self, statement: &str, strict: bool) -> Verdict {
        let statement = statement.trim();
        if statement.is_empty() {
            return Verdict::reject(VerdictReason::Empty);
        }

        if lexer::count_statements(statement) > 1 {
            return Verdict::reject(VerdictReason::MultipleStatements);
        }

        if strict && !self.is_read_query(statement) {
            return Verdict::reject(VerdictReason::ReadOnlyRequired);
        }

        if self.has_forbidden_content(statement) {
            return Verdict::reject(VerdictReason::ForbiddenKeyword);
        }

        Verdict::accept()
    }

    fn is_read_query(&self, statement: &str) -> bool {
        match lexer::first_keyword(statement).as_deref() {
            Some("SELECT") => true,
            Some("WITH") => self.allow_cte,
            _ => false,
        }
    }

    fn has_forbidden_content(&self, statement: &str) -> bool {
        if FORBIDDEN_KEYWORDS.is_match(statement) {
            return true;
        }

        if self.block_comment_markers {
            let code = lexer::mask_literals(statement);
            return FORBIDDEN_MARKERS.iter().any(|m| code.contains(m));
        }

        false
    }
}

/// Validates `statement` with the default policy.
pub fn validate(statement: &str, strict: bool) -> Verdict {
    Validator::default().validate(statement, strict)
}
