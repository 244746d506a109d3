//! Drive error types.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::retry::Retryable;

/// Result type for Drive operations.
pub type DriveResult<T> = Result<T, DriveError>;

/// Errors that can occur during Drive operations.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// 403 reasons Drive uses for quota pressure rather than access denial.
const RATE_LIMIT_REASONS: &[&str] = &[
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "sharingRateLimitExceeded",
];

impl DriveError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP error response to an error variant.
    ///
    /// `body` is the raw response body; Google's JSON error envelope is
    /// parsed when present to tell rate limiting apart from access denial.
    pub fn from_http_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> Self {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let message = parsed
            .as_ref()
            .map(|e| e.error.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.trim().chars().take(300).collect());
        let rate_limited_reason = parsed.as_ref().is_some_and(|e| {
            e.error
                .errors
                .iter()
                .any(|d| RATE_LIMIT_REASONS.contains(&d.reason.as_str()))
        });

        match status {
            400 => Self::BadRequest(message),
            401 => Self::Unauthenticated(message),
            403 if rate_limited_reason => Self::RateLimited {
                message,
                retry_after_ms,
            },
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            408 => Self::Timeout(message),
            429 => Self::RateLimited {
                message,
                retry_after_ms,
            },
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, message)),
        }
    }

    /// HTTP status this error corresponds to, for metrics.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DriveError::Unauthenticated(_) => Some(401),
            DriveError::NotFound(_) => Some(404),
            DriveError::PermissionDenied(_) => Some(403),
            DriveError::BadRequest(_) => Some(400),
            DriveError::RateLimited { .. } => Some(429),
            DriveError::ServerError(status, _) => Some(*status),
            DriveError::Timeout(_) => Some(408),
            DriveError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl Retryable for DriveError {
    /// Network hiccups, timeouts, rate limits and 5xx are worth retrying;
    /// everything that describes the request itself is not.
    fn is_transient(&self) -> bool {
        match self {
            DriveError::RateLimited { .. } | DriveError::ServerError(..) | DriveError::Timeout(_) => {
                true
            }
            DriveError::Network(e) => !(e.is_builder() || e.is_decode() || e.is_redirect()),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DriveError::RateLimited {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}
