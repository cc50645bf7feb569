//! SQL safety pipeline.
//!
//! Turns raw LLM output into a single, bounded, read-only statement, or an
//! explicit rejection. The pipeline is pure and synchronous: it never touches
//! the database and holds no shared mutable state.
//!
//! Stages, in order: [`normalize`] → [`validate`] → [`enforce_bound`].
//! Callers should depend on [`make_safe_statement`] or [`SafetyPipeline`].

pub mod lexer;
mod limit;
mod normalizer;
mod validator;

pub use limit::{enforce_bound, has_bound};
pub use normalizer::{normalize, Normalizer};
pub use validator::{validate, Validator};

use std::fmt;

use tracing::{debug, warn};

/// Default row-count bound.
pub const DEFAULT_BOUND: u32 = 200;

/// Why a statement was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictReason {
    /// Accepted.
    Ok,
    /// Nothing to validate.
    Empty,
    /// More than one statement.
    MultipleStatements,
    /// Strict mode and the statement does not start with a read query.
    ReadOnlyRequired,
    /// A blocklisted keyword or marker was found.
    ForbiddenKeyword,
}

impl VerdictReason {
    /// Returns the fixed, human-readable reason text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::MultipleStatements => "multiple statements",
            Self::ReadOnlyRequired => "only read queries allowed in strict mode",
            Self::ForbiddenKeyword => "forbidden keyword",
        }
    }
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// True only if the statement is a single read-only query.
    pub safe: bool,
    /// The rule that decided the verdict.
    pub reason: VerdictReason,
}

impl Verdict {
    /// An accepting verdict.
    pub fn accept() -> Self {
        Self {
            safe: true,
            reason: VerdictReason::Ok,
        }
    }

    /// A rejecting verdict with the given reason.
    pub fn reject(reason: VerdictReason) -> Self {
        Self {
            safe: false,
            reason,
        }
    }
}

/// A statement the pipeline refused to pass on for execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsafe SQL rejected: {reason}")]
pub struct Rejection {
    /// Why it was rejected. Never [`VerdictReason::Ok`].
    pub reason: VerdictReason,
    /// The normalized statement that was rejected.
    pub statement: String,
}

/// How to treat output holding more than one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiStatementPolicy {
    /// Reject the whole output. Trailing prose after the first statement is
    /// still dropped.
    #[default]
    Reject,
    /// Keep only the first statement and validate that.
    TakeFirst,
}

/// Policy knobs for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyPolicy {
    /// Only read queries are permitted.
    pub strict: bool,
    /// Row-count bound appended to unbounded statements.
    pub default_bound: u32,
    /// Accept `WITH` as a leading keyword in strict mode.
    pub allow_cte: bool,
    /// Reject `;`, `--` and `/*` outside string literals.
    pub block_comment_markers: bool,
    pub multi_statement: MultiStatementPolicy,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            strict: true,
            default_bound: DEFAULT_BOUND,
            allow_cte: true,
            block_comment_markers: true,
            multi_statement: MultiStatementPolicy::default(),
        }
    }
}

impl SafetyPolicy {
    /// Sets strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the default row-count bound.
    pub fn with_default_bound(mut self, default_bound: u32) -> Self {
        self.default_bound = default_bound;
        self
    }

    /// Sets whether `;`, `--` and `/*` outside literals are rejected.
    pub fn with_comment_markers(mut self, block: bool) -> Self {
        self.block_comment_markers = block;
        self
    }

    /// Sets the multi-statement policy.
    pub fn with_multi_statement(mut self, policy: MultiStatementPolicy) -> Self {
        self.multi_statement = policy;
        self
    }
}

/// The composed normalize → validate → bound pipeline.
#[derive(Debug, Clone, Copy)]
pub struct SafetyPipeline {
    policy: SafetyPolicy,
    normalizer: Normalizer,
    validator: Validator,
}

impl Default for SafetyPipeline {
    fn default() -> Self {
        Self::new(SafetyPolicy::default())
    }
}

impl SafetyPipeline {
    /// Creates a pipeline for the given policy.
    pub fn new(policy: SafetyPolicy) -> Self {
        Self {
            policy,
            normalizer: Normalizer::new(policy.multi_statement == MultiStatementPolicy::TakeFirst),
            validator: Validator {
                allow_cte: policy.allow_cte,
                block_comment_markers: policy.block_comment_markers,
            },
        }
    }

    /// Returns the policy this pipeline enforces.
    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Turns raw model output into an executable statement.
    ///
    /// Returns a [`Rejection`] when the normalized statement fails
    /// validation; nothing is "fixed" into a safe form.
    pub fn make_safe_statement(&self, raw: &str) -> Result<String, Rejection> {
        let statement = self.normalizer.normalize(raw);
        debug!(raw_len = raw.len(), statement = %statement, "Normalized model output");

        let verdict = self.validator.validate(&statement, self.policy.strict);
        if !verdict.safe {
            warn!(reason = %verdict.reason, statement = %statement, "Rejected unsafe SQL");
            return Err(Rejection {
                reason: verdict.reason,
                statement,
            });
        }

        let bounded = enforce_bound(&statement, self.policy.default_bound);
        debug!(statement = %bounded, "Statement accepted");
        Ok(bounded)
    }
}

/// Runs the pipeline with the default policy and the given strictness and
/// bound.
pub fn make_safe_statement(
    raw: &str,
    strict: bool,
    default_bound: u32,
) -> Result<String, Rejection> {
    let policy = SafetyPolicy::default()
        .with_strict(strict)
        .with_default_bound(default_bound);
    SafetyPipeline::new(policy).make_safe_statement(raw)
}
