pub mod generic_provider;
pub mod providers;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::DispatchError;

/// The closed set of upstream chat-completion vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
    Deepseek,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::Deepseek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Deepseek => "deepseek",
        }
    }

    pub fn from_id(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == normalized)
    }

    /// Infer the provider family from a model name prefix.
    pub fn from_model(model: &str) -> Option<Self> {
        let model = model.trim().to_lowercase();
        if model.starts_with("gpt") {
            Some(Provider::OpenAi)
        } else if model.starts_with("claude") {
            Some(Provider::Anthropic)
        } else if model.starts_with("gemini") {
            Some(Provider::Google)
        } else if model.starts_with("deepseek") {
            Some(Provider::Deepseek)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One prior turn of the conversation, supplied by the caller on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
}

#[cfg(test)]
impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a provider needs to shape a single chat-completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub history: &'a [ConversationTurn],
    pub message: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub http_status: u16,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Issue exactly one chat-completion call and return the reply text.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, DispatchError>;

    /// Read-only call (models listing) used to validate a stored credential.
    async fn test_connection(&self) -> Result<ConnectionTest, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_prefix_selects_exactly_one_provider() {
        let cases = [
            ("gpt-4o-mini", Provider::OpenAi),
            ("gpt-4o", Provider::OpenAi),
            ("claude-3-haiku", Provider::Anthropic),
            ("claude-3-sonnet", Provider::Anthropic),
            ("gemini-pro", Provider::Google),
            ("gemini-2.5-flash", Provider::Google),
            ("deepseek-chat", Provider::Deepseek),
            ("  GPT-4o ", Provider::OpenAi),
        ];
        for (model, expected) in cases {
            assert_eq!(Provider::from_model(model), Some(expected), "{}", model);
        }
    }

    #[test]
    fn unknown_model_prefix_has_no_provider() {
        for model in ["llama-3", "mistral-large", "", "o1-mini", "my-gpt"] {
            assert_eq!(Provider::from_model(model), None, "{}", model);
        }
    }

    #[test]
    fn provider_ids_roundtrip_through_serde_and_from_id() {
        for provider in Provider::ALL {
            let json = serde_json::to_value(provider).unwrap();
            assert_eq!(json, serde_json::json!(provider.as_str()));
            assert_eq!(Provider::from_id(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::from_id(" OpenAI "), Some(Provider::OpenAi));
        assert_eq!(Provider::from_id("azure"), None);
    }

    #[test]
    fn conversation_turn_rejects_unknown_roles() {
        let ok: ConversationTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(ok, ConversationTurn::assistant("hi"));
        assert!(serde_json::from_str::<ConversationTurn>(r#"{"role":"system","content":"x"}"#).is_err());
    }
}
