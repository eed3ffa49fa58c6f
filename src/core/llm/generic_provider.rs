use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use url::Url;

use super::providers::{anthropic, google, openai};
use super::registry::{ApiFormat, AuthType, ProviderDef};
use super::{CompletionRequest, ConnectionTest, LlmProvider, Provider};
use crate::core::error::DispatchError;

const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Catalogue-driven provider: one implementation covers every vendor, with
/// the body shape picked by `api_format` and auth by `auth.auth_type`.
pub struct GenericProvider {
    provider_def: ProviderDef,
    api_key: String,
    endpoint_override: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct VendorErrorBody {
    error: VendorError,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VendorError {
    Detailed { message: String },
    Plain(String),
}

impl GenericProvider {
    pub fn new(
        provider_def: ProviderDef,
        api_key: String,
        endpoint_override: Option<String>,
        client: Client,
    ) -> Self {
        Self {
            provider_def,
            api_key,
            endpoint_override: endpoint_override.filter(|s| !s.trim().is_empty()),
            client,
        }
    }

    fn chat_url(&self, model: &str) -> String {
        let template = self
            .endpoint_override
            .as_deref()
            .unwrap_or(&self.provider_def.chat_url);
        template.replace("{model}", model)
    }

    /// The models listing lives on the same host as chat, so an override
    /// swaps the origin of the catalogue URL and keeps its path.
    fn models_url(&self) -> String {
        match self.endpoint_override.as_deref() {
            Some(over) => swap_origin(&self.provider_def.models_url, over)
                .unwrap_or_else(|| self.provider_def.models_url.clone()),
            None => self.provider_def.models_url.clone(),
        }
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        let auth = &self.provider_def.auth;
        request = match auth.auth_type {
            AuthType::Bearer => request.bearer_auth(&self.api_key),
            AuthType::Header => {
                let name = auth.header_name.as_deref().unwrap_or("x-api-key");
                request.header(name, &self.api_key)
            }
            AuthType::QueryParam => {
                let name = auth.param_name.as_deref().unwrap_or("key");
                request.query(&[(name, self.api_key.as_str())])
            }
        };
        for (name, value) in &self.provider_def.extra_headers {
            request = request.header(name, value);
        }
        request
    }

    fn with_body(&self, builder: RequestBuilder, request: &CompletionRequest<'_>) -> RequestBuilder {
        match self.provider_def.api_format {
            ApiFormat::Openai => builder.json(&openai::build_request(request)),
            ApiFormat::Anthropic => builder.json(&anthropic::build_request(request)),
            ApiFormat::Gemini => builder.json(&google::build_request(request)),
        }
    }

    fn extract(&self, body: serde_json::Value) -> Result<String, String> {
        match self.provider_def.api_format {
            ApiFormat::Openai => openai::extract_reply(body),
            ApiFormat::Anthropic => anthropic::extract_reply(body),
            ApiFormat::Gemini => google::extract_reply(body),
        }
    }
}

#[async_trait]
impl LlmProvider for GenericProvider {
    fn provider(&self) -> Provider {
        self.provider_def.id
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, DispatchError> {
        let provider = self.provider();
        let url = self.chat_url(request.model);

        tracing::debug!(provider = %provider, model = request.model, "Sending chat completion");
        let res = self
            .with_body(self.authorize(self.client.post(&url)), request)
            .send()
            .await
            .map_err(|e| DispatchError::transport(provider, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| DispatchError::transport(provider, e))?;

        if !status.is_success() {
            tracing::warn!(provider = %provider, status = status.as_u16(), "Provider rejected request");
            return Err(DispatchError::Provider {
                provider,
                http_status: status.as_u16(),
                provider_message: provider_message(&text),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| DispatchError::malformed(provider, format!("body is not JSON: {}", e)))?;
        self.extract(json)
            .map_err(|detail| DispatchError::malformed(provider, detail))
    }

    async fn test_connection(&self) -> Result<ConnectionTest, DispatchError> {
        let provider = self.provider();
        let res = self
            .authorize(self.client.get(self.models_url()))
            .send()
            .await
            .map_err(|e| DispatchError::transport(provider, e))?;
        let status = res.status();
        Ok(ConnectionTest {
            success: status.is_success(),
            http_status: status.as_u16(),
        })
    }
}

fn swap_origin(default_url: &str, override_url: &str) -> Option<String> {
    let over = Url::parse(override_url).ok()?;
    let mut url = Url::parse(default_url).ok()?;
    url.set_scheme(over.scheme()).ok()?;
    url.set_host(over.host_str()).ok()?;
    url.set_port(over.port()).ok()?;
    Some(url.to_string())
}

/// Vendors wrap errors as `{"error":{"message":..}}` or `{"error":".."}`;
/// anything else is passed through, truncated.
fn provider_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<VendorErrorBody>(body) {
        return match parsed.error {
            VendorError::Detailed { message } => message,
            VendorError::Plain(message) => message,
        };
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        format!("{}…", cut)
    } else {
        trimmed.to_string()
    }
}
