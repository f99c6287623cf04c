// Unit Tests for Provider Wire Formats
//
// UNIT UNDER TEST: openai_compat and anthropic request/reply handling
//
// BUSINESS RESPONSIBILITY:
//   - Build the exact request body each provider kind expects
//   - Extract reply text and token usage from decoded response bodies
//   - Convert shape-missing responses into MalformedResponse errors
//
// TEST COVERAGE:
//   - Chat completions body fields (model, single user message, temperature)
//   - Messages body fields (model, max_tokens, single user message)
//   - Reply extraction with and without token usage
//   - Missing choices / missing content / non-text blocks
//   - Decoding of sparse provider responses (refusals, omitted usage)
//
// NOTE: HTTP-level behavior (headers, status mapping, timeouts) is covered
// with a mock server in the crate-level integration tests.

use crate::config::DispatchParams;
use crate::error::DispatchError;
use crate::registry::{ProviderKind, Target, TargetId};

use super::{anthropic, openai_compat};

fn target(kind: ProviderKind, name: &str) -> Target {
    Target {
        id: TargetId(1),
        name: name.to_string(),
        kind,
        endpoint: None,
        credential_ref: "TEST_KEY".to_string(),
        active: true,
    }
}

#[cfg(test)]
mod chat_wire_tests {
    use super::*;

    #[test]
    fn test_build_request_carries_model_message_and_temperature() {
        // Arrange
        let target = target(ProviderKind::Gateway, "openai/gpt-4");
        let params = DispatchParams::default().with_temperature(0.3);

        // Act
        let request = openai_compat::build_request(&target, &params, "Say hi");

        // Assert
        assert_eq!(request.model, "openai/gpt-4");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, "Say hi");
        assert!((request.temperature - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_request_serializes_to_expected_shape() {
        let target = target(ProviderKind::OpenAi, "gpt-4");
        let params = DispatchParams::default();

        let request = openai_compat::build_request(&target, &params, "Hello");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["temperature"], 0.7);
    }

    #[test]
    fn test_extract_reply_returns_text_and_total_tokens() {
        let response: openai_compat::ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }"#,
        )
        .unwrap();

        let reply = openai_compat::extract_reply(response).unwrap();

        assert_eq!(reply.text, "Hello!");
        assert_eq!(reply.tokens_used, Some(15));
    }

    #[test]
    fn test_extract_reply_without_usage_has_no_token_count() {
        let response: openai_compat::ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "ok"}}]}"#).unwrap();

        let reply = openai_compat::extract_reply(response).unwrap();

        assert_eq!(reply.text, "ok");
        assert_eq!(reply.tokens_used, None);
    }

    #[test]
    fn test_extract_reply_fails_on_empty_choices() {
        let response: openai_compat::ChatResponse =
            serde_json::from_str(r#"{"choices": []}"#).unwrap();

        let result = openai_compat::extract_reply(response);

        assert!(matches!(
            result,
            Err(DispatchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_extract_reply_fails_when_first_choice_has_no_content() {
        // Some gateways omit `content` entirely on refusals.
        let response: openai_compat::ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant"}}]}"#).unwrap();

        let result = openai_compat::extract_reply(response);

        assert!(matches!(
            result,
            Err(DispatchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_response_decodes_without_choices_field() {
        let response: openai_compat::ChatResponse = serde_json::from_str(r#"{}"#).unwrap();

        assert!(response.choices.is_empty());
        assert!(response.usage.is_none());
    }
}

#[cfg(test)]
mod messages_wire_tests {
    use super::*;

    #[test]
    fn test_build_request_carries_model_max_tokens_and_message() {
        // Arrange
        let target = target(ProviderKind::Anthropic, "claude-3-5-sonnet-20241022");
        let params = DispatchParams::default().with_max_tokens(2048);

        // Act
        let request = anthropic::build_request(&target, &params, "Say hi");

        // Assert
        assert_eq!(request.model, "claude-3-5-sonnet-20241022");
        assert_eq!(request.max_tokens, 2048);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, "Say hi");
    }

    #[test]
    fn test_extract_reply_sums_input_and_output_tokens() {
        let response: anthropic::MessagesResponse = serde_json::from_str(
            r#"{
                "content": [{"type": "text", "text": "Hello there"}],
                "usage": {"input_tokens": 10, "output_tokens": 20}
            }"#,
        )
        .unwrap();

        let reply = anthropic::extract_reply(response).unwrap();

        assert_eq!(reply.text, "Hello there");
        assert_eq!(reply.tokens_used, Some(30));
    }

    #[test]
    fn test_extract_reply_without_usage_has_no_token_count() {
        let response: anthropic::MessagesResponse =
            serde_json::from_str(r#"{"content": [{"type": "text", "text": "ok"}]}"#).unwrap();

        let reply = anthropic::extract_reply(response).unwrap();

        assert_eq!(reply.tokens_used, None);
    }

    #[test]
    fn test_extract_reply_fails_on_empty_content() {
        let response: anthropic::MessagesResponse =
            serde_json::from_str(r#"{"content": []}"#).unwrap();

        let result = anthropic::extract_reply(response);

        assert!(matches!(
            result,
            Err(DispatchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_extract_reply_fails_when_first_block_is_not_text() {
        // Tool-use and other block types carry no reply text.
        let response: anthropic::MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "tool_use", "id": "t1", "name": "f", "input": {}}]}"#,
        )
        .unwrap();

        let result = anthropic::extract_reply(response);

        assert!(matches!(
            result,
            Err(DispatchError::MalformedResponse { .. })
        ));
    }
}
