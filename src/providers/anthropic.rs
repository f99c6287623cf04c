//! Anthropic's native messages wire format.
//!
//! Differs from the OpenAI-compatible dialect in every way that matters
//! here: authentication rides in `x-api-key` plus a pinned
//! `anthropic-version`, the body must carry an explicit `max_tokens`, the
//! reply text lives in typed content blocks, and token usage is reported
//! as separate input/output counts that the engine sums into one total.

use serde::{Deserialize, Serialize};

use crate::config::DispatchParams;
use crate::error::{DispatchError, DispatchResult};
use crate::logging::log_debug;
use crate::registry::Target;

use super::adapter::ProviderReply;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API request body.
#[derive(Debug, Clone, Serialize)]
pub(super) struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<MessagesMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct MessagesMessage {
    pub role: String,
    pub content: String,
}

/// Messages API response body, reduced to the fields the engine consumes.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<MessagesUsage>,
}

/// A typed content block. Blocks other than text (tool use and the like)
/// decode to [`ContentBlock::Other`] and yield no reply text.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub(super) enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct MessagesUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Builds the request body for a target.
pub(super) fn build_request(
    target: &Target,
    params: &DispatchParams,
    prompt: &str,
) -> MessagesRequest {
    MessagesRequest {
        model: target.name.clone(),
        max_tokens: params.max_tokens,
        messages: vec![MessagesMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
    }
}

/// Pulls the reply text and summed token usage out of a decoded response.
///
/// The first content block must be a text block; anything else fails with
/// [`DispatchError::MalformedResponse`].
pub(super) fn extract_reply(response: MessagesResponse) -> DispatchResult<ProviderReply> {
    let text = match response.content.first() {
        Some(ContentBlock::Text { text }) => text.clone(),
        Some(ContentBlock::Other) => {
            return Err(DispatchError::malformed_response(
                "first content block carried no text",
            ))
        }
        None => {
            return Err(DispatchError::malformed_response(
                "response contained no content blocks",
            ))
        }
    };

    let tokens_used = response
        .usage
        .map(|usage| usage.input_tokens + usage.output_tokens);
    Ok(ProviderReply { text, tokens_used })
}

/// Sends one prompt over the native messages wire and normalizes the reply.
pub(super) async fn send(
    client: &reqwest::Client,
    params: &DispatchParams,
    target: &Target,
    api_key: &str,
    prompt: &str,
) -> DispatchResult<ProviderReply> {
    let url = target.endpoint_url();
    let request = build_request(target, params, prompt);

    let response = client
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .timeout(params.request_timeout)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
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

    let decoded: MessagesResponse = serde_json::from_str(&body)
        .map_err(|e| DispatchError::malformed_response(format!("undecodable response body: {e}")))?;

    let reply = extract_reply(decoded)?;
    log_debug!(
        target = %target.name,
        reply_chars = reply.text.len(),
        tokens_used = reply.tokens_used,
        "Messages reply extracted"
    );
    Ok(reply)
}
