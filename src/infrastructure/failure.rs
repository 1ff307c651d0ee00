//! Turns non-success HTTP answers into [`InfraError`] values.
//!
//! The backend reports lockout data inside its prose `detail` messages
//! ("2 attempts remaining", "Try again in 4m 30s"). Structured fields
//! (`attempts_remaining`, `retry_after_seconds`) and the `Retry-After`
//! header are honored first when a server sends them.

use crate::infrastructure::error::InfraError;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static ATTEMPTS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s+(?:login\s+)?attempts?\s+(?:remaining|left)")
        .expect("valid attempts pattern")
});
static LOCKOUT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)m (\d+)s").expect("valid lockout pattern"));

/// What a 401 means for the request that received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthorized {
    SessionExpired,
    BadCredentials,
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureBody {
    pub detail: Option<String>,
    pub attempts_remaining: Option<u32>,
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FailurePayload {
    detail: Option<serde_json::Value>,
    message: Option<String>,
    attempts_remaining: Option<u32>,
    retry_after_seconds: Option<u64>,
}

pub fn parse_failure_body(body: &str) -> FailureBody {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return FailureBody::default();
    }

    match serde_json::from_str::<FailurePayload>(trimmed) {
        Ok(payload) => {
            let detail = payload
                .detail
                .map(|value| match value {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                })
                .or(payload.message)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());
            FailureBody {
                detail,
                attempts_remaining: payload.attempts_remaining,
                retry_after_seconds: payload.retry_after_seconds,
            }
        }
        Err(_) => FailureBody {
            detail: Some(trimmed.to_string()),
            ..FailureBody::default()
        },
    }
}

pub fn parse_attempts_remaining(detail: &str) -> Option<u32> {
    ATTEMPTS_PATTERN
        .captures(detail)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse::<u32>().ok())
}

/// `"Try again in 2m 30s"` -> 150.
pub fn parse_lockout_seconds(detail: &str) -> Option<u64> {
    let captures = LOCKOUT_PATTERN.captures(detail)?;
    let minutes = captures.get(1)?.as_str().parse::<u64>().ok()?;
    let seconds = captures.get(2)?.as_str().parse::<u64>().ok()?;
    minutes.checked_mul(60)?.checked_add(seconds)
}

pub fn parse_retry_after_header(value: Option<&str>) -> Option<u64> {
    value.and_then(|raw| raw.trim().parse::<u64>().ok())
}

pub fn classify_failure(
    on_unauthorized: Unauthorized,
    fallback_detail: &str,
    status: u16,
    body: &str,
    retry_after_header: Option<u64>,
) -> InfraError {
    let parsed = parse_failure_body(body);
    let detail = parsed
        .detail
        .clone()
        .unwrap_or_else(|| fallback_detail.to_string());

    match status {
        401 => match on_unauthorized {
            Unauthorized::SessionExpired => InfraError::AuthExpired,
            Unauthorized::BadCredentials => InfraError::InvalidCredentials {
                attempts_remaining: parsed
                    .attempts_remaining
                    .or_else(|| parse_attempts_remaining(&detail)),
                detail,
            },
            Unauthorized::Rejected => InfraError::Rejected { status, detail },
        },
        429 => InfraError::RateLimited {
            retry_after_seconds: parsed
                .retry_after_seconds
                .or(retry_after_header)
                .or_else(|| parse_lockout_seconds(&detail)),
            detail,
        },
        400..=499 => InfraError::Rejected { status, detail },
        _ => InfraError::Server { status, detail },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_duration_is_parsed_from_prose() {
        assert_eq!(parse_lockout_seconds("Try again in 2m 30s"), Some(150));
        assert_eq!(parse_lockout_seconds("Locked. Try again in 0m 5s."), Some(5));
        assert_eq!(parse_lockout_seconds("Try again later"), None);
    }

    #[test]
    fn attempts_count_is_parsed_from_prose() {
        assert_eq!(
            parse_attempts_remaining("Incorrect username or password. 2 attempts remaining"),
            Some(2)
        );
        assert_eq!(parse_attempts_remaining("1 attempt remaining"), Some(1));
        assert_eq!(parse_attempts_remaining("Incorrect username or password"), None);
    }

    #[test]
    fn rate_limit_with_prose_duration() {
        let error = classify_failure(
            Unauthorized::BadCredentials,
            "Login failed",
            429,
            r#"{"detail":"Too many attempts. Try again in 2m 30s"}"#,
            None,
        );
        match error {
            InfraError::RateLimited {
                retry_after_seconds,
                detail,
            } => {
                assert_eq!(retry_after_seconds, Some(150));
                assert!(detail.contains("2m 30s"));
            }
            other => panic!("expected rate limited, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_without_duration_leaves_it_to_the_caller() {
        let error = classify_failure(
            Unauthorized::BadCredentials,
            "Login failed",
            429,
            r#"{"detail":"Too many attempts"}"#,
            None,
        );
        assert!(matches!(
            error,
            InfraError::RateLimited {
                retry_after_seconds: None,
                ..
            }
        ));
    }

    #[test]
    fn structured_fields_win_over_prose_and_header() {
        let error = classify_failure(
            Unauthorized::BadCredentials,
            "Login failed",
            429,
            r#"{"detail":"Try again in 9m 0s","retry_after_seconds":42}"#,
            Some(77),
        );
        assert!(matches!(
            error,
            InfraError::RateLimited {
                retry_after_seconds: Some(42),
                ..
            }
        ));

        let error = classify_failure(
            Unauthorized::BadCredentials,
            "Login failed",
            429,
            r#"{"detail":"Try again in 9m 0s"}"#,
            Some(77),
        );
        assert!(matches!(
            error,
            InfraError::RateLimited {
                retry_after_seconds: Some(77),
                ..
            }
        ));
    }

    #[test]
    fn unauthorized_meaning_depends_on_request() {
        let body = r#"{"detail":"Incorrect username or password. 1 attempts remaining"}"#;
        assert!(matches!(
            classify_failure(Unauthorized::SessionExpired, "x", 401, body, None),
            InfraError::AuthExpired
        ));
        assert!(matches!(
            classify_failure(Unauthorized::BadCredentials, "x", 401, body, None),
            InfraError::InvalidCredentials {
                attempts_remaining: Some(1),
                ..
            }
        ));
        assert!(matches!(
            classify_failure(Unauthorized::Rejected, "x", 401, body, None),
            InfraError::Rejected { status: 401, .. }
        ));
    }

    #[test]
    fn empty_or_plain_bodies_fall_back() {
        match classify_failure(Unauthorized::Rejected, "Signup failed", 400, "", None) {
            InfraError::Rejected { detail, .. } => assert_eq!(detail, "Signup failed"),
            other => panic!("unexpected {other:?}"),
        }
        match classify_failure(Unauthorized::Rejected, "Signup failed", 502, "Bad Gateway", None) {
            InfraError::Server { status, detail } => {
                assert_eq!(status, 502);
                assert_eq!(detail, "Bad Gateway");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn validation_error_lists_are_kept_as_json_text() {
        let parsed = parse_failure_body(r#"{"detail":[{"loc":["body","email"],"msg":"field required"}]}"#);
        assert!(parsed.detail.expect("detail").contains("field required"));
    }
}
