//! Kind-based routing between wire dialects.

use crate::config::DispatchParams;
use crate::error::DispatchResult;
use crate::logging::log_debug;
use crate::registry::{ProviderKind, Target};

use super::{anthropic, openai_compat};

/// Normalized reply from any provider kind.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// The assistant text, exactly as the provider returned it.
    pub text: String,
    /// Total token usage when the provider reported it.
    pub tokens_used: Option<u32>,
}

/// Sends one prompt to one target and normalizes the answer.
///
/// The adapter does not resolve credentials itself; callers pass the secret
/// in. One request per call, no retries: a failed call surfaces as a
/// [`DispatchError`](crate::error::DispatchError) and the dispatcher records
/// it against the target.
#[derive(Debug)]
pub struct ProviderAdapter {
    client: reqwest::Client,
    params: DispatchParams,
}

impl ProviderAdapter {
    pub fn new(params: DispatchParams) -> Self {
        Self {
            client: reqwest::Client::new(),
            params,
        }
    }

    pub fn params(&self) -> &DispatchParams {
        &self.params
    }

    /// Builds the kind-specific request, POSTs it with the configured
    /// timeout, and extracts the reply text plus token usage.
    pub async fn send(
        &self,
        target: &Target,
        api_key: &str,
        prompt: &str,
    ) -> DispatchResult<ProviderReply> {
        log_debug!(
            target = %target.name,
            kind = %target.kind,
            endpoint = %target.endpoint_url(),
            prompt_chars = prompt.len(),
            "Sending prompt to target"
        );

        match target.kind {
            ProviderKind::Anthropic => {
                anthropic::send(&self.client, &self.params, target, api_key, prompt).await
            }
            ProviderKind::Gateway
            | ProviderKind::OpenAi
            | ProviderKind::DeepSeek
            | ProviderKind::Groq => {
                openai_compat::send(&self.client, &self.params, target, api_key, prompt).await
            }
        }
    }
}
