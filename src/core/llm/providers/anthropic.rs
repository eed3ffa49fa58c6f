//! Anthropic messages shape.

use serde::{Deserialize, Serialize};

use super::MAX_TOKENS;
use crate::core::llm::CompletionRequest;

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    text: Option<String>,
}

/// History is mapped as one ordered sequence; roles are never split apart
/// and re-zipped, so non-alternating conversations keep their order.
pub(crate) fn build_request<'a>(req: &CompletionRequest<'a>) -> AnthropicRequest<'a> {
    let mut messages: Vec<AnthropicMessage<'a>> = req
        .history
        .iter()
        .map(|turn| AnthropicMessage {
            role: turn.role.as_str(),
            content: turn.content.as_str(),
        })
        .collect();
    messages.push(AnthropicMessage {
        role: "user",
        content: req.message,
    });

    AnthropicRequest {
        model: req.model,
        system: req.system_prompt,
        messages,
        max_tokens: MAX_TOKENS,
    }
}

/// `content[0].text`
pub(crate) fn extract_reply(body: serde_json::Value) -> Result<String, String> {
    let parsed: AnthropicResponse =
        serde_json::from_value(body).map_err(|e| format!("missing content: {}", e))?;
    let block = parsed
        .content
        .into_iter()
        .next()
        .ok_or_else(|| "content array is empty".to_string())?;
    block
        .text
        .ok_or_else(|| "content[0].text is missing".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ConversationTurn;
    use serde_json::json;

    #[test]
    fn system_is_separate_and_history_keeps_original_order() {
        let history = vec![
            ConversationTurn::user("a"),
            ConversationTurn::user("b"),
            ConversationTurn::assistant("c"),
            ConversationTurn::user("d"),
        ];
        let req = CompletionRequest {
            model: "claude-3-haiku",
            system_prompt: "You quote prices.",
            history: &history,
            message: "e",
        };
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "claude-3-haiku",
                "system": "You quote prices.",
                "messages": [
                    { "role": "user", "content": "a" },
                    { "role": "user", "content": "b" },
                    { "role": "assistant", "content": "c" },
                    { "role": "user", "content": "d" },
                    { "role": "user", "content": "e" }
                ],
                "max_tokens": 1000
            })
        );
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let req = CompletionRequest {
            model: "claude-3-haiku",
            system_prompt: "",
            history: &[],
            message: "hi",
        };
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert!(body.get("system").is_none());
    }

    #[test]
    fn extracts_first_block_text() {
        let body = json!({ "content": [{ "type": "text", "text": "hi" }] });
        assert_eq!(extract_reply(body).unwrap(), "hi");
    }

    #[test]
    fn rejects_missing_or_empty_content() {
        assert!(extract_reply(json!({ "content": [] })).is_err());
        assert!(extract_reply(json!({ "content": [{ "type": "tool_use" }] })).is_err());
        assert!(extract_reply(json!({ "choices": [] })).is_err());
    }
}
