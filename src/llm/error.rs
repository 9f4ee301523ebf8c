//! LLM error types with failover classification.
//!
//! Distinguishes between errors the failover loop absorbs (rate limits,
//! exhausted quotas, missing models, network hiccups, unusable payloads) and
//! errors that end a generation run.

use std::sync::OnceLock;

use regex::Regex;

/// Error from generative API calls.
#[derive(Debug, Clone)]
pub struct LlmError {
    /// The kind of error
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message (usually the response body)
    pub message: String,
    /// Wait hint parsed from a rate-limit body, in seconds
    pub retry_hint_secs: Option<f64>,
}

impl LlmError {
    /// Create a rate limit error.
    pub fn rate_limited(message: String, retry_hint_secs: Option<f64>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            status_code: Some(429),
            message,
            retry_hint_secs,
        }
    }

    /// Create a daily-quota error.
    pub fn quota_exhausted(message: String) -> Self {
        Self {
            kind: LlmErrorKind::QuotaExhausted,
            status_code: Some(429),
            message,
            retry_hint_secs: None,
        }
    }

    /// Create a model-not-found error.
    pub fn model_not_found(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ModelNotFound,
            status_code: Some(404),
            message,
            retry_hint_secs: None,
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
            retry_hint_secs: None,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
            retry_hint_secs: None,
        }
    }

    /// Create an error for any other non-success status.
    pub fn rejected(status_code: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::Rejected,
            status_code: Some(status_code),
            message,
            retry_hint_secs: None,
        }
    }

    /// Classify a non-success HTTP reply.
    ///
    /// A 429 whose body carries a daily-quota signature becomes
    /// `QuotaExhausted`; any other 429 becomes `RateLimited` with the wait
    /// hint parsed from the body.
    pub fn from_reply(status: u16, body: &str) -> Self {
        match classify_http_status(status) {
            LlmErrorKind::RateLimited if is_daily_quota(body) => {
                Self::quota_exhausted(body.to_string())
            }
            LlmErrorKind::RateLimited => Self::rate_limited(body.to_string(), parse_retry_hint(body)),
            LlmErrorKind::ModelNotFound => Self::model_not_found(body.to_string()),
            _ => Self::rejected(status, body.to_string()),
        }
    }

    /// Check if the failover loop should absorb this error.
    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of generative API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429 without a quota signature - wait and retry the same model
    RateLimited,
    /// 429 with a daily-quota signature - exclude the model for this run
    QuotaExhausted,
    /// 404 - model removed or renamed, switch models
    ModelNotFound,
    /// Connection failed or timed out - short delay, same model
    NetworkError,
    /// Success status but no usable payload - switch models
    ParseError,
    /// Any other non-success status - ends the run
    Rejected,
}

impl LlmErrorKind {
    /// Check if this error kind keeps the failover loop going.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LlmErrorKind::Rejected)
    }

    /// Check if this error should take the current model out of rotation.
    pub fn should_switch_model(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::QuotaExhausted | LlmErrorKind::ModelNotFound | LlmErrorKind::ParseError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::QuotaExhausted => write!(f, "Quota exhausted"),
            LlmErrorKind::ModelNotFound => write!(f, "Model not found"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
            LlmErrorKind::Rejected => write!(f, "Request rejected"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        404 => LlmErrorKind::ModelNotFound,
        _ => LlmErrorKind::Rejected,
    }
}

/// Whether a 429 body signals a per-day quota rather than a short-term limit.
pub fn is_daily_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("perday") || lower.contains("per day") || lower.contains("daily")
}

/// Extract a "retry in N seconds" hint from a rate-limit body.
///
/// Understands the prose form (`Please retry in 12.5s.`) and the structured
/// form (`"retryDelay": "12s"`).
pub fn parse_retry_hint(body: &str) -> Option<f64> {
    static PROSE: OnceLock<Regex> = OnceLock::new();
    static STRUCTURED: OnceLock<Regex> = OnceLock::new();

    let prose = PROSE.get_or_init(|| {
        Regex::new(r"(?i)retry in\s+([0-9]+(?:\.[0-9]+)?)\s*s").expect("valid retry regex")
    });
    let structured = STRUCTURED.get_or_init(|| {
        Regex::new(r#""retryDelay"\s*:\s*"([0-9]+(?:\.[0-9]+)?)s""#).expect("valid retryDelay regex")
    });

    [prose, structured].iter().find_map(|re| {
        re.captures(body)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTA_BODY: &str = r#"{"error":{"code":429,"message":"You exceeded your current quota.","details":[{"violations":[{"quotaId":"GenerateRequestsPerDayPerProjectPerModel-FreeTier"}]}]}}"#;
    const MINUTE_BODY: &str = r#"{"error":{"code":429,"message":"Resource exhausted. Please retry in 17.3s.","details":[{"quotaId":"GenerateRequestsPerMinutePerProjectPerModel"},{"retryDelay":"17s"}]}}"#;

    #[test]
    fn test_recoverable_classification() {
        assert!(LlmErrorKind::RateLimited.is_recoverable());
        assert!(LlmErrorKind::QuotaExhausted.is_recoverable());
        assert!(LlmErrorKind::ModelNotFound.is_recoverable());
        assert!(LlmErrorKind::NetworkError.is_recoverable());
        assert!(LlmErrorKind::ParseError.is_recoverable());
        assert!(!LlmErrorKind::Rejected.is_recoverable());

        assert!(LlmErrorKind::QuotaExhausted.should_switch_model());
        assert!(!LlmErrorKind::RateLimited.should_switch_model());
        assert!(!LlmErrorKind::NetworkError.should_switch_model());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(404), LlmErrorKind::ModelNotFound);
        assert_eq!(classify_http_status(400), LlmErrorKind::Rejected);
        assert_eq!(classify_http_status(403), LlmErrorKind::Rejected);
        assert_eq!(classify_http_status(500), LlmErrorKind::Rejected);
        assert_eq!(classify_http_status(503), LlmErrorKind::Rejected);
    }

    #[test]
    fn test_daily_quota_reply_is_exhaustion() {
        let err = LlmError::from_reply(429, QUOTA_BODY);
        assert_eq!(err.kind, LlmErrorKind::QuotaExhausted);
        assert_eq!(err.retry_hint_secs, None);
    }

    #[test]
    fn test_short_term_limit_carries_hint() {
        let err = LlmError::from_reply(429, MINUTE_BODY);
        assert_eq!(err.kind, LlmErrorKind::RateLimited);
        assert_eq!(err.retry_hint_secs, Some(17.3));
    }

    #[test]
    fn test_retry_hint_forms() {
        assert_eq!(parse_retry_hint("Please retry in 4s."), Some(4.0));
        assert_eq!(parse_retry_hint(r#"{"retryDelay": "31s"}"#), Some(31.0));
        assert_eq!(parse_retry_hint("slow down"), None);
        assert_eq!(parse_retry_hint(""), None);
    }

    #[test]
    fn test_display_includes_status() {
        let err = LlmError::rejected(500, "boom".to_string());
        assert_eq!(err.to_string(), "Request rejected (HTTP 500): boom");
        let err = LlmError::network_error("reset".to_string());
        assert_eq!(err.to_string(), "Network error: reset");
    }
}
