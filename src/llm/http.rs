//! Shared HTTP plumbing for the REST LLM providers.

use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AppError;

/// Maximum number of attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Maps an error status and body to (error, is_retryable).
pub(crate) type ErrorParser = fn(StatusCode, &str) -> (AppError, bool);

/// Why a request gave up.
#[derive(Debug)]
pub(crate) enum HttpFailure {
    /// The API answered with an error status.
    Status {
        status: StatusCode,
        body: String,
        error: AppError,
    },
    /// No usable answer: connect failure, timeout, unreadable body.
    Transport(AppError),
}

impl HttpFailure {
    pub(crate) fn into_error(self) -> AppError {
        match self {
            Self::Status { error, .. } | Self::Transport(error) => error,
        }
    }
}

/// Sends the request built by `build`, retrying rate limits, server errors,
/// timeouts and connect failures with exponential backoff.
///
/// Returns the body of the first successful response.
pub(crate) async fn send_with_retry<F>(
    provider: &str,
    build: F,
    parse_error: ErrorParser,
) -> Result<String, HttpFailure>
where
    F: Fn() -> RequestBuilder,
{
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
    let mut attempt = 1;

    loop {
        debug!(
            "{} API request attempt {} of {}",
            provider, attempt, MAX_RETRY_ATTEMPTS
        );

        let (failure, is_retryable) = match build().send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.map_err(|e| {
                    HttpFailure::Transport(AppError::llm(format!(
                        "Failed to read response: {}",
                        e
                    )))
                })?;

                if status.is_success() {
                    return Ok(body);
                }

                let (error, is_retryable) = parse_error(status, &body);
                (
                    HttpFailure::Status {
                        status,
                        body,
                        error,
                    },
                    is_retryable,
                )
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    AppError::llm("Request timed out. Try again.")
                } else if e.is_connect() {
                    AppError::llm(format!(
                        "Failed to connect to the {} API. Check your network.",
                        provider
                    ))
                } else {
                    AppError::llm(format!("Request failed: {}", e))
                };
                (
                    HttpFailure::Transport(error),
                    is_retryable_request_error(&e),
                )
            }
        };

        if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
            return Err(failure);
        }

        warn!(
            "{} API request failed (attempt {}), retrying in {:?}: {}",
            provider,
            attempt,
            delay,
            failure_summary(&failure)
        );

        tokio::time::sleep(delay).await;
        delay *= 2;
        attempt += 1;
    }
}

/// Determines if a request error is retryable.
fn is_retryable_request_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn failure_summary(failure: &HttpFailure) -> String {
    match failure {
        HttpFailure::Status { status, .. } => status.to_string(),
        HttpFailure::Transport(error) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_error() {
        let failure = HttpFailure::Status {
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
            error: AppError::llm("bad request"),
        };
        assert_eq!(failure.into_error().to_string(), "LLM error: bad request");

        let failure = HttpFailure::Transport(AppError::llm("timed out"));
        assert_eq!(failure.into_error().to_string(), "LLM error: timed out");
    }

    #[test]
    fn test_failure_summary() {
        let failure = HttpFailure::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
            error: AppError::llm("overloaded"),
        };
        assert_eq!(failure_summary(&failure), "503 Service Unavailable");
    }
}
