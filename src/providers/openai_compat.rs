//! OpenAI-compatible chat completions wire format.
//!
//! One request/response shape serves four provider kinds: the gateway
//! aggregator plus OpenAI, DeepSeek and Groq, which all accept the same
//! `{model, messages, temperature}` body and answer with
//! `choices[0].message.content`. Gateway requests additionally carry the
//! attribution headers the aggregator asks clients to send.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::DispatchParams;
use crate::error::{DispatchError, DispatchResult};
use crate::logging::log_debug;
use crate::registry::{ProviderKind, Target};

use super::adapter::ProviderReply;

/// Chat completions request body.
#[derive(Debug, Clone, Serialize)]
pub(super) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

/// One message in the request body.
#[derive(Debug, Clone, Serialize)]
pub(super) struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat completions response body. Only the fields the engine consumes are
/// modeled; everything else in the provider's reply is ignored.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ChatResponseMessage {
    /// Some gateways omit `content` entirely on refusals, hence `Option`.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ChatUsage {
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Builds the request body for a target.
pub(super) fn build_request(target: &Target, params: &DispatchParams, prompt: &str) -> ChatRequest {
    ChatRequest {
        model: target.name.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        temperature: params.temperature,
    }
}

/// Pulls the reply text and token usage out of a decoded response.
///
/// A response without a first choice, or whose first choice carries no
/// content, fails with [`DispatchError::MalformedResponse`].
pub(super) fn extract_reply(response: ChatResponse) -> DispatchResult<ProviderReply> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DispatchError::malformed_response("response contained no choices"))?;

    let text = choice.message.content.ok_or_else(|| {
        DispatchError::malformed_response("first choice carried no message content")
    })?;

    let tokens_used = response.usage.and_then(|usage| usage.total_tokens);
    Ok(ProviderReply { text, tokens_used })
}

/// Sends one prompt over the OpenAI-compatible wire and normalizes the reply.
pub(super) async fn send(
    client: &reqwest::Client,
    params: &DispatchParams,
    target: &Target,
    api_key: &str,
    prompt: &str,
) -> DispatchResult<ProviderReply> {
    let url = target.endpoint_url();
    let request = build_request(target, params, prompt);

    let mut builder = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {api_key}"))
        .timeout(params.request_timeout);

    // The gateway asks clients to identify themselves so usage can be
    // attributed; the other kinds reject unknown headers less gracefully.
    if target.kind == ProviderKind::Gateway {
        builder = builder
            .header("HTTP-Referer", "https://github.com")
            .header("X-Title", "broadcast-llm");
    }

    let response = builder.json(&request).send().await.map_err(|e| {
        DispatchError::transport(
            format!("request to {url} failed: {e}"),
            Some(Box::new(e)),
        )
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        DispatchError::transport(
            format!("failed to read response body from {url}: {e}"),
            Some(Box::new(e)),
        )
    })?;

    if !status.is_success() {
        return Err(DispatchError::http_status(status.as_u16(), &body));
    }

    let decoded: ChatResponse = serde_json::from_str(&body)
        .map_err(|e| DispatchError::malformed_response(format!("undecodable response body: {e}")))?;

    let reply = extract_reply(decoded)?;
    log_debug!(
        target = %target.name,
        reply_chars = reply.text.len(),
        tokens_used = reply.tokens_used,
        "Chat completions reply extracted"
    );
    Ok(reply)
}
