//! Test helper utilities for broadcast-llm integration tests
//!
//! This module provides reusable test fixtures and helper functions
//! that are shared across multiple test modules.
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broadcast_llm::{
    CredentialSource, DispatchParams, DispatchResult, ProviderKind, Target, TargetId,
    TargetRecord, TargetRegistry, TargetStore,
};
use wiremock::ResponseTemplate;

// ============================================================================
// Store and Credential Fixtures
// ============================================================================

/// In-memory target store over a fixed record set.
///
/// Integration tests mostly hand targets to the dispatcher directly, so the
/// store usually stays empty; it exists because a registry needs one.
pub struct InMemoryStore {
    records: Vec<TargetRecord>,
}

impl InMemoryStore {
    pub fn new(records: Vec<TargetRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl TargetStore for InMemoryStore {
    async fn load_targets(&self) -> DispatchResult<Vec<TargetRecord>> {
        Ok(self.records.clone())
    }
}

/// Credential source over a fixed reference-to-secret map.
pub struct MapCredentials {
    values: HashMap<String, String>,
}

impl MapCredentials {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(reference, value)| (reference.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl CredentialSource for MapCredentials {
    fn resolve(&self, reference: &str) -> Option<String> {
        self.values.get(reference).cloned()
    }
}

// ============================================================================
// Target and Registry Builders
// ============================================================================

/// Create a registry over an empty store with the given credentials
///
/// # Arguments
///
/// * `credentials` - `(reference, secret)` pairs the source should resolve
///
/// # Returns
///
/// An `Arc<TargetRegistry>` ready to hand to a dispatcher or improver.
pub fn create_test_registry(credentials: &[(&str, &str)]) -> Arc<TargetRegistry> {
    Arc::new(TargetRegistry::new(
        Arc::new(InMemoryStore::empty()),
        Arc::new(MapCredentials::new(credentials)),
    ))
}

/// Create a target with an explicit endpoint override
///
/// # Arguments
///
/// * `endpoint` - Full URL the target should dial (e.g. mock server + path)
pub fn create_test_target(
    id: i64,
    name: &str,
    kind: ProviderKind,
    credential_ref: &str,
    endpoint: &str,
) -> Arc<Target> {
    Arc::new(Target {
        id: TargetId(id),
        name: name.to_string(),
        kind,
        endpoint: Some(endpoint.to_string()),
        credential_ref: credential_ref.to_string(),
        active: true,
    })
}

/// Create an OpenAI-dialect target pointed at a mock server
///
/// The endpoint is `base_url` plus the real chat-completions path, so mocks
/// can match on `path("/v1/chat/completions")`.
pub fn create_chat_target(
    id: i64,
    name: &str,
    credential_ref: &str,
    base_url: &str,
) -> Arc<Target> {
    create_test_target(
        id,
        name,
        ProviderKind::OpenAi,
        credential_ref,
        &format!("{base_url}/v1/chat/completions"),
    )
}

/// Create a gateway-dialect target pointed at a mock server
///
/// Gateway targets carry attribution headers on the wire; mocks can match
/// on `path("/api/v1/chat/completions")`.
pub fn create_gateway_target(
    id: i64,
    name: &str,
    credential_ref: &str,
    base_url: &str,
) -> Arc<Target> {
    create_test_target(
        id,
        name,
        ProviderKind::Gateway,
        credential_ref,
        &format!("{base_url}/api/v1/chat/completions"),
    )
}

/// Create an Anthropic-dialect target pointed at a mock server
///
/// Mocks can match on `path("/v1/messages")`.
pub fn create_anthropic_target(
    id: i64,
    name: &str,
    credential_ref: &str,
    base_url: &str,
) -> Arc<Target> {
    create_test_target(
        id,
        name,
        ProviderKind::Anthropic,
        credential_ref,
        &format!("{base_url}/v1/messages"),
    )
}

/// Create dispatch parameters with timeouts suitable for mock-server tests
///
/// Keeps the shipped defaults except for a short request timeout, so a test
/// that accidentally leaves a mock unmatched fails fast.
pub fn create_test_params() -> DispatchParams {
    DispatchParams::default().with_request_timeout(Duration::from_secs(5))
}

// ============================================================================
// Mock Response Helpers (for wiremock)
// ============================================================================

/// Create successful chat-completions response
///
/// Returns a JSON body matching the OpenAI-compatible chat format, with the
/// given reply text and total token count.
pub fn create_successful_chat_response(text: &str, total_tokens: u32) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test123",
        "object": "chat.completion",
        "created": 1234567890,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": text
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": total_tokens.saturating_sub(10),
            "total_tokens": total_tokens
        }
    })
}

/// Create chat-completions response with no usage block
///
/// Some gateways omit usage; replies must still parse with no token count.
pub fn create_chat_response_without_usage(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test124",
        "object": "chat.completion",
        "created": 1234567890,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": text
            },
            "finish_reason": "stop"
        }]
    })
}

/// Create successful Anthropic messages response
///
/// Returns a JSON body matching Anthropic's Messages API format.
pub fn create_successful_messages_response(
    text: &str,
    input_tokens: u32,
    output_tokens: u32,
) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_test123",
        "type": "message",
        "role": "assistant",
        "content": [{
            "type": "text",
            "text": text
        }],
        "model": "claude-3-5-sonnet-20241022",
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {
            "input_tokens": input_tokens,
            "output_tokens": output_tokens
        }
    })
}

/// Create error response template for wiremock
///
/// # Arguments
///
/// * `status` - HTTP status code
/// * `message` - Error message
///
/// # Returns
///
/// A `ResponseTemplate` that can be mounted on a wiremock `Mock`.
pub fn create_error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": {
            "message": message,
            "type": "api_error"
        }
    }))
}

/// Create 429 rate limit error response
///
/// Returns a ResponseTemplate with retry-after header.
pub fn create_rate_limit_response() -> ResponseTemplate {
    ResponseTemplate::new(429)
        .insert_header("retry-after", "60")
        .set_body_json(serde_json::json!({
            "error": {
                "message": "Rate limit exceeded",
                "type": "rate_limit_error"
            }
        }))
}
