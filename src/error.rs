//! Error types for broadcast and parse operations.
//!
//! One enum, [`DispatchError`], covers every failure mode the engine can
//! produce:
//! - Credential lookups that come back empty (no network attempted)
//! - Transport failures (connection refused, request timeout)
//! - Non-2xx HTTP statuses
//! - 2xx bodies that lack the expected provider shape
//! - Structured-response parsing that recovered only some fields, or nothing
//! - Target store reloads and registry invariant violations
//! - Cooperative batch cancellation
//!
//! During a dispatch these never abort the batch: the dispatcher folds them
//! into per-target [`DispatchOutcome`](crate::dispatch::DispatchOutcome)s.
//! Only registry loads surface as `Err` to the caller.
//!
//! Use [`DispatchResult<T>`] as the crate-wide result alias:
//!
//! ```rust
//! use broadcast_llm::DispatchResult;
//!
//! fn normalize(text: &str) -> DispatchResult<String> {
//!     Ok(text.trim().to_string())
//! }
//! ```

use crate::logging::{log_error, log_warn};
use thiserror::Error;

/// High-level bucket for routing and handling decisions.
///
/// Obtained via [`DispatchError::category()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller or configuration can fix it (missing credential,
    /// duplicate target names). Retrying unchanged will not help.
    Client,

    /// The remote endpoint or the network misbehaved.
    External,

    /// Temporary condition worth retrying with backoff (timeouts,
    /// throttling statuses).
    Transient,
}

/// Convenient result type for engine operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Errors produced while broadcasting prompts or recovering structured
/// replies.
///
/// Constructor methods log at creation with structured fields; prefer them
/// over building variants directly.
///
/// | Variant | Category | Retryable |
/// |---------|----------|-----------|
/// | `CredentialMissing` | Client | No |
/// | `Transport` | Transient | Yes |
/// | `HttpStatus` | External | 429/5xx only |
/// | `MalformedResponse` | External | No |
/// | `ParseIncomplete` | External | No |
/// | `ParseEmpty` | External | No |
/// | `Store` | External | No |
/// | `DuplicateTarget` | Client | No |
/// | `Cancelled` | Client | No |
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The target's credential reference resolved to nothing (or to a blank
    /// string). No network call was attempted for the target.
    #[error("credential '{reference}' is missing or blank")]
    CredentialMissing {
        /// The credential reference that failed to resolve, typically an
        /// environment variable name.
        reference: String,
    },

    /// The HTTP request never produced a response: connection failure,
    /// DNS error, or the per-request timeout fired.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Leading slice of the response body for diagnostics.
        body_preview: String,
    },

    /// A 2xx response body could not be decoded, or decoded without the
    /// fields the provider kind is expected to carry (first choice,
    /// content block, message text).
    #[error("malformed response body: {message}")]
    MalformedResponse {
        /// Details about the missing or undecodable shape.
        message: String,
    },

    /// The structured-response parser recovered a primary result but one or
    /// more secondary fields could not be found in the raw text.
    #[error("structured reply incomplete: missing {missing}")]
    ParseIncomplete {
        /// Comma-joined names of the fields that stayed empty.
        missing: String,
    },

    /// The structured-response parser recovered nothing: the raw text was
    /// empty or whitespace-only.
    #[error("no usable content extracted")]
    ParseEmpty,

    /// The target store failed while (re)loading the registry snapshot.
    #[error("target store error: {message}")]
    Store {
        /// Description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Two target records in one snapshot share an id or a name. The
    /// registry refuses the whole snapshot rather than pick a winner.
    #[error("duplicate target {field}: {value}")]
    DuplicateTarget {
        /// Which uniqueness rule was violated: `"id"` or `"name"`.
        field: &'static str,
        /// The offending value, rendered for diagnostics.
        value: String,
    },

    /// The batch was abandoned through its cancellation token before this
    /// target's network call started (or finished client-side).
    #[error("dispatch cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Bucket for routing and handling decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CredentialMissing { .. } => ErrorCategory::Client,
            Self::Transport { .. } => ErrorCategory::Transient,
            Self::HttpStatus { status, .. } if retryable_status(*status) => {
                ErrorCategory::Transient
            }
            Self::HttpStatus { .. } => ErrorCategory::External,
            Self::MalformedResponse { .. } => ErrorCategory::External,
            Self::ParseIncomplete { .. } => ErrorCategory::External,
            Self::ParseEmpty => ErrorCategory::External,
            Self::Store { .. } => ErrorCategory::External,
            Self::DuplicateTarget { .. } => ErrorCategory::Client,
            Self::Cancelled => ErrorCategory::Client,
        }
    }

    /// Whether a fresh attempt could plausibly succeed.
    ///
    /// True for transport failures and for throttling/server statuses
    /// (429, 5xx). Credential, parsing, and invariant errors stay false:
    /// retrying them unchanged reproduces the failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::HttpStatus { status, .. } => retryable_status(*status),
            _ => false,
        }
    }

    /// Short machine-readable tag, used on log lines and suitable for
    /// grouping outcomes in a results table.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CredentialMissing { .. } => "credential_missing",
            Self::Transport { .. } => "transport",
            Self::HttpStatus { .. } => "http_status",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::ParseIncomplete { .. } => "parse_incomplete",
            Self::ParseEmpty => "parse_empty",
            Self::Store { .. } => "store",
            Self::DuplicateTarget { .. } => "duplicate_target",
            Self::Cancelled => "cancelled",
        }
    }

    /// Message safe to show to end users; technical detail is generalized.
    pub fn user_message(&self) -> String {
        match self {
            Self::CredentialMissing { reference } => {
                format!("API key '{reference}' is not configured. Check your .env file")
            }
            Self::Transport { .. } => {
                "Could not reach the model endpoint. Please try again".to_string()
            }
            Self::HttpStatus { status, .. } => {
                format!("The model endpoint rejected the request (HTTP {status})")
            }
            Self::MalformedResponse { .. } => {
                "Received an unexpected reply from the model endpoint".to_string()
            }
            Self::ParseIncomplete { missing } => {
                format!("The reply was only partially structured (missing {missing})")
            }
            Self::ParseEmpty => "The reply contained no usable text".to_string(),
            Self::Store { .. } => "Could not load the configured targets".to_string(),
            Self::DuplicateTarget { field, value } => {
                format!("Two targets share the same {field} ({value})")
            }
            Self::Cancelled => "The request batch was cancelled".to_string(),
        }
    }

    // =========================================================================
    // Constructor methods with automatic logging
    // =========================================================================

    /// Credential reference resolved to nothing (logs at WARN level).
    pub fn credential_missing(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        log_warn!(
            error_type = "credential_missing",
            reference = %reference,
            "Credential reference missing or blank"
        );
        Self::CredentialMissing { reference }
    }

    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let message = message.into();
        log_error!(
            error_type = "transport",
            message = %message,
            has_source = source.is_some(),
            "Transport-level request failure"
        );
        Self::Transport { message, source }
    }

    pub fn http_status(status: u16, body: &str) -> Self {
        let body_preview: String = body.chars().take(200).collect();
        log_error!(
            error_type = "http_status",
            status = status,
            body_preview = %body_preview,
            "Endpoint returned non-success status"
        );
        Self::HttpStatus {
            status,
            body_preview,
        }
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_type = "malformed_response",
            message = %message,
            "Response body lacked the expected shape"
        );
        Self::MalformedResponse { message }
    }

    pub fn parse_incomplete(missing: impl Into<String>) -> Self {
        let missing = missing.into();
        log_warn!(
            error_type = "parse_incomplete",
            missing = %missing,
            "Structured reply recovered partially"
        );
        Self::ParseIncomplete { missing }
    }

    pub fn parse_empty() -> Self {
        log_warn!(
            error_type = "parse_empty",
            "Structured reply recovered nothing"
        );
        Self::ParseEmpty
    }

    pub fn store(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let message = message.into();
        log_error!(
            error_type = "store",
            message = %message,
            "Target store operation failed"
        );
        Self::Store { message, source }
    }

    pub fn duplicate_target(field: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        log_error!(
            error_type = "duplicate_target",
            field = field,
            value = %value,
            "Registry snapshot violates target uniqueness"
        );
        Self::DuplicateTarget { field, value }
    }

    /// Batch abandoned before this target completed (logs at WARN level).
    pub fn cancelled() -> Self {
        log_warn!(error_type = "cancelled", "Dispatch worker cancelled");
        Self::Cancelled
    }
}

/// Statuses where the endpoint may behave differently on a later attempt.
fn retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
