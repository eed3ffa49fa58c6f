//! OpenAI chat-completions shape, shared by Deepseek.

use serde::{Deserialize, Serialize};

use super::{MAX_TOKENS, TEMPERATURE};
use crate::core::llm::CompletionRequest;

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    content: Option<String>,
}

pub(crate) fn build_request<'a>(req: &CompletionRequest<'a>) -> OpenAiRequest<'a> {
    let mut messages = Vec::with_capacity(req.history.len() + 2);
    messages.push(OpenAiMessage {
        role: "system",
        content: req.system_prompt,
    });
    messages.extend(req.history.iter().map(|turn| OpenAiMessage {
        role: turn.role.as_str(),
        content: turn.content.as_str(),
    }));
    messages.push(OpenAiMessage {
        role: "user",
        content: req.message,
    });

    OpenAiRequest {
        model: req.model,
        messages,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

/// `choices[0].message.content`
pub(crate) fn extract_reply(body: serde_json::Value) -> Result<String, String> {
    let parsed: OpenAiResponse =
        serde_json::from_value(body).map_err(|e| format!("missing choices: {}", e))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| "choices array is empty".to_string())?;
    choice
        .message
        .content
        .ok_or_else(|| "choices[0].message.content is null".to_string())
}
