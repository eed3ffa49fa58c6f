//! Gemini `generateContent` shape.

use serde::{Deserialize, Serialize};

use super::{MAX_TOKENS, TEMPERATURE};
use crate::core::llm::{ChatRole, CompletionRequest};

#[derive(Debug, Serialize)]
pub(crate) struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResContent,
}

#[derive(Deserialize)]
struct GeminiResContent {
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    text: Option<String>,
}

fn gemini_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

/// Gemini has no system role here, so the persona prompt rides on the
/// first user turn. Consecutive same-role turns are merged since the API
/// requires strict alternation.
pub(crate) fn build_request(req: &CompletionRequest<'_>) -> GeminiRequest {
    let turns = req
        .history
        .iter()
        .map(|t| (t.role, t.content.as_str()))
        .chain(std::iter::once((ChatRole::User, req.message)));

    let mut contents: Vec<GeminiContent> = Vec::new();
    for (role, text) in turns {
        let role = gemini_role(role);
        if let Some(last) = contents.last_mut()
            && last.role == role
            && let Some(part) = last.parts.first_mut()
        {
            part.text.push('\n');
            part.text.push_str(text);
            continue;
        }
        contents.push(GeminiContent {
            role,
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
        });
    }

    if !req.system_prompt.is_empty()
        && let Some(first_user) = contents.iter_mut().find(|c| c.role == "user")
        && let Some(part) = first_user.parts.first_mut()
    {
        part.text = format!("{}\n\n{}", req.system_prompt, part.text);
    }

    GeminiRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_TOKENS,
        },
    }
}

/// `candidates[0].content.parts[0].text`
pub(crate) fn extract_reply(body: serde_json::Value) -> Result<String, String> {
    let parsed: GeminiResponse =
        serde_json::from_value(body).map_err(|e| format!("missing candidates: {}", e))?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| "candidates array is empty".to_string())?;
    candidate
        .content
        .parts
        .into_iter()
        .next()
        .and_then(|p| p.text)
        .ok_or_else(|| "candidates[0].content.parts[0].text is missing".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ConversationTurn;
    use serde_json::json;

    #[test]
    fn empty_history_prepends_prompt_to_message() {
        let req = CompletionRequest {
            model: "gemini-pro",
            system_prompt: "Be terse.",
            history: &[],
            message: "hello",
        };
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "Be terse.\n\nhello" }] }
                ],
                "generationConfig": { "temperature": 0.7, "maxOutputTokens": 1000 }
            })
        );
    }

    #[test]
    fn maps_assistant_to_model_and_merges_repeats() {
        let history = vec![
            ConversationTurn::user("one"),
            ConversationTurn::assistant("two"),
            ConversationTurn::assistant("three"),
        ];
        let req = CompletionRequest {
            model: "gemini-pro",
            system_prompt: "P",
            history: &history,
            message: "four",
        };
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(
            body["contents"],
            json!([
                { "role": "user", "parts": [{ "text": "P\n\none" }] },
                { "role": "model", "parts": [{ "text": "two\nthree" }] },
                { "role": "user", "parts": [{ "text": "four" }] }
            ])
        );
    }

    #[test]
    fn history_opening_with_model_turn_still_gets_prompt_on_first_user() {
        let history = vec![ConversationTurn::assistant("Welcome!")];
        let req = CompletionRequest {
            model: "gemini-pro",
            system_prompt: "P",
            history: &history,
            message: "hi",
        };
        let body = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Welcome!");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "P\n\nhi");
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = json!({ "candidates": [{ "content": { "parts": [{ "text": "hi" }] } }] });
        assert_eq!(extract_reply(body).unwrap(), "hi");
    }

    #[test]
    fn rejects_blocked_or_empty_candidates() {
        assert!(extract_reply(json!({ "candidates": [] })).is_err());
        assert!(extract_reply(json!({ "candidates": [{ "content": { "parts": [] } }] })).is_err());
        assert!(extract_reply(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).is_err());
    }
}
