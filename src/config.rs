//! Tunable parameters for a dispatch batch.
//!
//! [`DispatchParams`] travels with the dispatcher rather than living in
//! process-global state, so two batches with different settings can run in
//! the same process without interfering.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-batch request settings.
///
/// The defaults match what the engine ships with: a 60 second per-request
/// timeout, at most 10 requests in flight, sampling temperature 0.7 and a
/// 4096-token completion cap for providers that require one.
///
/// ```rust
/// use broadcast_llm::DispatchParams;
/// use std::time::Duration;
///
/// let params = DispatchParams::default()
///     .with_request_timeout(Duration::from_secs(30))
///     .with_max_concurrent(4);
/// assert_eq!(params.max_concurrent, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchParams {
    /// Hard deadline for a single HTTP request, connection setup included.
    pub request_timeout: Duration,

    /// Upper bound on simultaneously in-flight requests across the batch.
    /// Never goes below 1.
    pub max_concurrent: usize,

    /// Sampling temperature forwarded to every provider.
    pub temperature: f64,

    /// Completion-token cap, forwarded where the wire format demands one
    /// (Anthropic) and omitted elsewhere.
    pub max_tokens: u32,
}

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_concurrent: 10,
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

impl DispatchParams {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Values below 1 are clamped up: a batch must always be able to make
    /// progress.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
