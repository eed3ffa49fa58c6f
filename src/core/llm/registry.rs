use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Provider;

const PROVIDERS_JSON: &str = include_str!("providers.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRegistry {
    pub providers: Vec<ProviderDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDef {
    pub id: Provider,
    pub name: String,
    pub api_format: ApiFormat,
    /// Chat endpoint; may contain a `{model}` placeholder.
    pub chat_url: String,
    pub models_url: String,
    pub auth: AuthConfig,
    pub default_model: String,
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    Openai,
    Gemini,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub param_name: Option<String>,
    /// Header carrying the raw key for `header` auth.
    #[serde(default)]
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    QueryParam,
    Header,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub id: String,
    pub name: String,
}

impl ProviderRegistry {
    pub fn load() -> Self {
        serde_json::from_str(PROVIDERS_JSON).expect("providers.json is invalid")
    }

    pub fn get(&self, provider: Provider) -> Option<&ProviderDef> {
        self.providers.iter().find(|p| p.id == provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalogue_covers_every_provider() {
        let registry = ProviderRegistry::load();
        for provider in Provider::ALL {
            let def = registry.get(provider).expect("provider listed");
            assert!(!def.models.is_empty());
            assert!(def.chat_url.starts_with("https://"));
        }
    }

    #[test]
    fn auth_shapes_match_vendor_conventions() {
        let registry = ProviderRegistry::load();
        let openai = registry.get(Provider::OpenAi).unwrap();
        assert_eq!(openai.auth.auth_type, AuthType::Bearer);
        assert_eq!(openai.api_format, ApiFormat::Openai);

        let anthropic = registry.get(Provider::Anthropic).unwrap();
        assert_eq!(anthropic.auth.auth_type, AuthType::Header);
        assert_eq!(anthropic.auth.header_name.as_deref(), Some("x-api-key"));
        assert_eq!(
            anthropic.extra_headers.get("anthropic-version").map(String::as_str),
            Some("2023-06-01")
        );

        let google = registry.get(Provider::Google).unwrap();
        assert_eq!(google.auth.auth_type, AuthType::QueryParam);
        assert!(google.chat_url.contains("{model}"));

        let deepseek = registry.get(Provider::Deepseek).unwrap();
        assert_eq!(deepseek.api_format, ApiFormat::Openai);
        assert_eq!(deepseek.auth.auth_type, AuthType::Bearer);
    }
}
