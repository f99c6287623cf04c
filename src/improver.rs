//! Prompt improvement: one meta-request to a single target.
//!
//! [`PromptImprover`] wraps a prompt in a fixed improvement template, sends
//! it to one target through the shared [`ProviderAdapter`], and recovers a
//! [`StructuredImprovementResult`] from the reply with
//! [`StructuredResponseParser`]. Failures — missing credential, transport,
//! unusable reply — land in the result's `error` field, never as `Err`, so
//! callers handle one shape.

use std::sync::Arc;

use crate::error::DispatchError;
use crate::logging::{log_debug, log_info};
use crate::providers::ProviderAdapter;
use crate::registry::{Target, TargetRegistry};
use crate::response_parser::StructuredResponseParser;

/// Structured outcome of one improvement request.
///
/// Carries the original prompt, the recovered rewrites, and the display name
/// of the target that produced them. When `error` is set the other fields
/// hold whatever was recovered best-effort (usually nothing).
#[derive(Debug)]
pub struct StructuredImprovementResult {
    /// The prompt the improvement request was about.
    pub original: String,
    /// Primary improved rewrite. Empty when recovery failed.
    pub improved: String,
    /// Up to three alternative rewrites, strongest first.
    pub alternatives: Vec<String>,
    /// Rewrite tuned for code generation.
    pub variant_code: Option<String>,
    /// Rewrite tuned for analytical depth.
    pub variant_analysis: Option<String>,
    /// Rewrite tuned for creative writing.
    pub variant_creative: Option<String>,
    /// Display name of the target that produced the reply.
    pub source_name: String,
    pub error: Option<DispatchError>,
}

impl StructuredImprovementResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn empty(original: &str, source_name: &str) -> Self {
        Self {
            original: original.to_string(),
            improved: String::new(),
            alternatives: Vec::new(),
            variant_code: None,
            variant_analysis: None,
            variant_creative: None,
            source_name: source_name.to_string(),
            error: None,
        }
    }

    pub(crate) fn failed(original: &str, source_name: &str, error: DispatchError) -> Self {
        let mut result = Self::empty(original, source_name);
        result.error = Some(error);
        result
    }
}

/// Instructions placed ahead of the prompt being improved. The flat-JSON
/// shape keeps [`StructuredResponseParser`]'s first layer viable; the marked
/// sections named at the end are its second.
const META_PROMPT_HEADER: &str = "\
You are a prompt engineering assistant. Improve the prompt below and propose variations.

Reply with one flat JSON object, no nested braces, using exactly these keys:
{\"improved\": \"...\", \"alternatives\": [\"...\", \"...\", \"...\"], \"variant_code\": \"...\", \"variant_analysis\": \"...\", \"variant_creative\": \"...\"}

- \"improved\": the strongest general-purpose rewrite
- \"alternatives\": up to three distinct rewrites, strongest first
- \"variant_code\": a rewrite tuned for code generation
- \"variant_analysis\": a rewrite tuned for analytical depth
- \"variant_creative\": a rewrite tuned for creative writing

If you cannot produce JSON, use plainly marked sections instead:
\"Improved:\", \"Alternatives:\", \"Code:\", \"Analysis:\", \"Creative:\".";

/// Builds the full meta-prompt for one improvement request.
pub fn meta_prompt(original_prompt: &str) -> String {
    format!("{META_PROMPT_HEADER}\n\nPrompt to improve:\n{original_prompt}")
}

/// Sends improvement meta-requests and recovers structured results.
pub struct PromptImprover {
    registry: Arc<TargetRegistry>,
    adapter: Arc<ProviderAdapter>,
    parser: StructuredResponseParser,
}

impl PromptImprover {
    pub fn new(registry: Arc<TargetRegistry>, adapter: Arc<ProviderAdapter>) -> Self {
        Self {
            registry,
            adapter,
            parser: StructuredResponseParser::new(),
        }
    }

    /// Asks `target` to improve `original_prompt`.
    ///
    /// Credential and adapter failures come back inside the result with the
    /// primary empty; a reply that arrives is always parsed, however
    /// unstructured.
    pub async fn improve(
        &self,
        target: &Target,
        original_prompt: &str,
    ) -> StructuredImprovementResult {
        let source_name = target.display_name();
        log_info!(
            target = %target.name,
            prompt_chars = original_prompt.len(),
            "Improvement request started"
        );

        let Some(api_key) = self.registry.credential_for(target) else {
            return StructuredImprovementResult::failed(
                original_prompt,
                &source_name,
                DispatchError::credential_missing(&target.credential_ref),
            );
        };

        let request = meta_prompt(original_prompt);
        log_debug!(meta_prompt_chars = request.len(), "Meta-prompt built");

        match self.adapter.send(target, &api_key, &request).await {
            Ok(reply) => {
                let result = self.parser.parse(&reply.text, original_prompt, &source_name);
                log_info!(
                    target = %target.name,
                    recovered_alternatives = result.alternatives.len(),
                    success = result.is_success(),
                    "Improvement request complete"
                );
                result
            }
            Err(error) => {
                StructuredImprovementResult::failed(original_prompt, &source_name, error)
            }
        }
    }
}
