//! RFC 7807 problem details, extended with a stable machine-readable code.

use serde::{Deserialize, Serialize};

/// RFC 7807 Problem Details for HTTP APIs.
///
/// See: https://datatracker.ietf.org/doc/html/rfc7807
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub error_type: String,

    /// A short, human-readable summary of the problem type.
    pub title: String,

    /// The HTTP status code.
    pub status: u16,

    /// Stable code clients can branch on (e.g. `RATE_LIMIT`).
    pub code: String,

    /// A human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Correlation ID of the request that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: u16, code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            error_type: "about:blank".to_string(),
            title: title.into(),
            status,
            code: code.into(),
            detail: None,
            correlation_id: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, "VALIDATION_ERROR", "Bad Request").with_detail(detail)
    }

    pub fn unauthorized() -> Self {
        Self::new(401, "UNAUTHORIZED", "Unauthorized")
    }

    /// 429 for an exhausted tier quota over a window of `window_secs`.
    pub fn rate_limited(tier: &str, limit: u32, window_secs: u64) -> Self {
        let per = match window_secs {
            60 => "min".to_string(),
            secs => format!("{secs}s"),
        };
        Self::new(429, "RATE_LIMIT", "Too Many Requests")
            .with_detail(format!("Rate limit exceeded ({tier}: {limit}/{per})"))
    }

    pub fn account_locked() -> Self {
        Self::new(429, "ACCOUNT_LOCKED", "Too Many Requests")
            .with_detail("Too many failed attempts. Account temporarily locked.")
    }

    pub fn internal_error() -> Self {
        Self::new(500, "INTERNAL_ERROR", "Internal Server Error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_body() {
        let body = serde_json::to_value(ErrorResponse::rate_limited("auth", 10, 60)).unwrap();

        assert_eq!(body["type"], "about:blank");
        assert_eq!(body["status"], 429);
        assert_eq!(body["code"], "RATE_LIMIT");
        assert_eq!(body["detail"], "Rate limit exceeded (auth: 10/min)");
        assert!(body.get("correlation_id").is_none());
    }

    #[test]
    fn test_rate_limited_names_custom_window() {
        let error = ErrorResponse::rate_limited("write", 30, 10);
        assert_eq!(error.detail.as_deref(), Some("Rate limit exceeded (write: 30/10s)"));
    }
}
