use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::{info, warn};

use crate::core::error::DispatchError;
use crate::core::llm::generic_provider::GenericProvider;
use crate::core::llm::registry::ProviderRegistry;
use crate::core::llm::{CompletionRequest, ConnectionTest, ConversationTurn, LlmProvider, Provider};
use crate::core::store::Store;
use crate::core::vault::CredentialVault;

/// Turns one chat turn addressed to a persona into exactly one provider call.
pub struct Dispatcher {
    store: Store,
    vault: Arc<CredentialVault>,
    registry: ProviderRegistry,
    client: Client,
}

impl Dispatcher {
    pub fn new(store: Store, vault: Arc<CredentialVault>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            store,
            vault,
            registry: ProviderRegistry::load(),
            client,
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        agent_id: &str,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, DispatchError> {
        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            return Err(DispatchError::Validation("agentId is required".into()));
        }
        if message.trim().is_empty() {
            return Err(DispatchError::Validation("message is required".into()));
        }

        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("agent '{}' not found", agent_id)))?;
        if !agent.active {
            warn!("Refusing dispatch to inactive agent '{}'", agent_id);
            return Err(DispatchError::Inactive(agent.agent_id));
        }

        let provider = agent
            .provider
            .or_else(|| Provider::from_model(&agent.target_model))
            .ok_or_else(|| DispatchError::UnsupportedModel(agent.target_model.clone()))?;

        let client = self.provider_client(provider).await?;
        info!(
            "Dispatching agent '{}' to {} ({})",
            agent.agent_id, provider, agent.target_model
        );

        let request = CompletionRequest {
            model: &agent.target_model,
            system_prompt: &agent.system_prompt,
            history,
            message,
        };
        client.complete(&request).await
    }

    pub async fn test_connection(&self, provider: Provider) -> Result<ConnectionTest, DispatchError> {
        let client = self.provider_client(provider).await?;
        let result = client.test_connection().await?;
        info!(
            "Connection test for {}: HTTP {}",
            provider, result.http_status
        );
        Ok(result)
    }

    async fn provider_client(&self, provider: Provider) -> Result<GenericProvider, DispatchError> {
        let credential = self
            .vault
            .get_credential(provider)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| {
                DispatchError::NotFound(format!("no active credential for provider '{}'", provider))
            })?;
        let def = self.registry.get(provider).cloned().ok_or_else(|| {
            DispatchError::NotFound(format!("provider '{}' is not in the catalogue", provider))
        })?;
        Ok(GenericProvider::new(
            def,
            credential.secret,
            credential.endpoint_override,
            self.client.clone(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::store::types::AgentInput;
    use crate::core::vault::CredentialInput;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::response::IntoResponse;
    use serde_json::{Value, json};

    #[derive(Debug, Clone)]
    pub(crate) struct RecordedCall {
        pub path: String,
        pub query: Option<String>,
        pub headers: HeaderMap,
        pub body: Value,
    }

    #[derive(Clone)]
    pub(crate) struct MockProvider {
        pub base_url: String,
        calls: Arc<std::sync::Mutex<Vec<RecordedCall>>>,
    }

    impl MockProvider {
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[derive(Clone)]
    struct MockState {
        status: StatusCode,
        reply: String,
        calls: Arc<std::sync::Mutex<Vec<RecordedCall>>>,
    }

    async fn record(
        State(state): State<MockState>,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> impl IntoResponse {
        let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
        state.calls.lock().unwrap().push(RecordedCall {
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
            body,
        });
        (
            state.status,
            [("content-type", "application/json")],
            state.reply.clone(),
        )
    }

    /// Serves every path with a fixed status and body, recording each request.
    pub(crate) async fn spawn_mock(status: StatusCode, reply: &str) -> MockProvider {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let app = Router::new().fallback(record).with_state(MockState {
            status,
            reply: reply.to_string(),
            calls: calls.clone(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        MockProvider {
            base_url: format!("http://{}", addr),
            calls,
        }
    }

    pub(crate) async fn test_parts() -> (Store, Arc<CredentialVault>) {
        let store = Store::in_memory().unwrap();
        let vault = Arc::new(CredentialVault::new(store.get_db(), [3u8; 32]));
        vault.initialize().await.unwrap();
        (store, vault)
    }

    fn dispatcher(store: &Store, vault: &Arc<CredentialVault>) -> Dispatcher {
        Dispatcher::new(store.clone(), vault.clone(), Duration::from_secs(5)).unwrap()
    }

    fn agent(agent_id: &str, model: &str, active: bool) -> AgentInput {
        AgentInput {
            agent_id: agent_id.into(),
            name: agent_id.into(),
            description: String::new(),
            system_prompt: "Be terse.".into(),
            target_model: model.into(),
            provider: None,
            active,
            persona_type: Some("atendimento".into()),
        }
    }

    async fn credential(vault: &CredentialVault, provider: &str, endpoint: Option<String>, active: bool) {
        vault
            .save_credential(&CredentialInput {
                provider: provider.into(),
                secret: "sk-test".into(),
                endpoint_override: endpoint,
                active,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    const OPENAI_HI: &str = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;

    #[tokio::test]
    async fn openai_end_to_end_sends_one_shaped_call() {
        let mock = spawn_mock(StatusCode::OK, OPENAI_HI).await;
        let (store, vault) = test_parts().await;
        credential(
            &vault,
            "openai",
            Some(format!("{}/v1/chat/completions", mock.base_url)),
            true,
        )
        .await;
        store.save_agent(&agent("atendimento", "gpt-4o-mini", true)).await.unwrap();

        let reply = dispatcher(&store, &vault)
            .dispatch("atendimento", "hello", &[])
            .await
            .unwrap();
        assert_eq!(reply, "hi");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/v1/chat/completions");
        assert_eq!(calls[0].headers["authorization"], "Bearer sk-test");
        assert_eq!(calls[0].body["model"], "gpt-4o-mini");
        assert_eq!(
            calls[0].body["messages"],
            json!([
                { "role": "system", "content": "Be terse." },
                { "role": "user", "content": "hello" }
            ])
        );
    }

    #[tokio::test]
    async fn inactive_agent_makes_zero_calls() {
        let mock = spawn_mock(StatusCode::OK, OPENAI_HI).await;
        let (store, vault) = test_parts().await;
        credential(&vault, "openai", Some(mock.base_url.clone()), true).await;
        store.save_agent(&agent("email", "gpt-4o", false)).await.unwrap();

        let err = dispatcher(&store, &vault)
            .dispatch("email", "hello", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "inactive");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_model_fails_closed_for_intake_personas() {
        let mock = spawn_mock(StatusCode::OK, OPENAI_HI).await;
        let (store, vault) = test_parts().await;
        credential(&vault, "google", Some(mock.base_url.clone()), true).await;
        store.save_agent(&agent("atendimento", "llama-3", true)).await.unwrap();

        let err = dispatcher(&store, &vault)
            .dispatch("atendimento", "hello", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unsupported_model");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_agent_or_credential_is_not_found() {
        let (store, vault) = test_parts().await;
        let d = dispatcher(&store, &vault);
        assert_eq!(d.dispatch("ghost", "hi", &[]).await.unwrap_err().kind(), "not_found");

        store.save_agent(&agent("orcamento", "claude-3-haiku", true)).await.unwrap();
        assert_eq!(
            d.dispatch("orcamento", "hi", &[]).await.unwrap_err().kind(),
            "not_found"
        );
    }

    #[tokio::test]
    async fn inactive_credential_is_not_found() {
        let mock = spawn_mock(StatusCode::OK, OPENAI_HI).await;
        let (store, vault) = test_parts().await;
        credential(&vault, "deepseek", Some(mock.base_url.clone()), false).await;
        store.save_agent(&agent("a", "deepseek-chat", true)).await.unwrap();

        let err = dispatcher(&store, &vault).dispatch("a", "hi", &[]).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_inputs_are_validation_errors() {
        let (store, vault) = test_parts().await;
        let d = dispatcher(&store, &vault);
        assert_eq!(d.dispatch("", "hi", &[]).await.unwrap_err().kind(), "validation_error");
        assert_eq!(d.dispatch("a", "  ", &[]).await.unwrap_err().kind(), "validation_error");
    }

    #[tokio::test]
    async fn non_2xx_surfaces_provider_error_with_status() {
        let mock = spawn_mock(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        )
        .await;
        let (store, vault) = test_parts().await;
        credential(
            &vault,
            "openai",
            Some(format!("{}/v1/chat/completions", mock.base_url)),
            true,
        )
        .await;
        store.save_agent(&agent("a", "gpt-4o-mini", true)).await.unwrap();

        match dispatcher(&store, &vault).dispatch("a", "hi", &[]).await {
            Err(DispatchError::Provider {
                provider,
                http_status,
                provider_message,
            }) => {
                assert_eq!(provider, Provider::OpenAi);
                assert_eq!(http_status, 401);
                assert_eq!(provider_message, "Incorrect API key provided");
            }
            other => panic!("expected provider error, got {:?}", other),
        }
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn unexpected_2xx_shape_is_malformed() {
        let mock = spawn_mock(StatusCode::OK, r#"{"content":[{"text":"hi"}]}"#).await;
        let (store, vault) = test_parts().await;
        credential(&vault, "openai", Some(mock.base_url.clone()), true).await;
        store.save_agent(&agent("a", "gpt-4o", true)).await.unwrap();

        let err = dispatcher(&store, &vault).dispatch("a", "hi", &[]).await.unwrap_err();
        assert_eq!(err.kind(), "malformed_provider_response");
    }

    #[tokio::test]
    async fn anthropic_call_uses_key_header_and_version() {
        let mock = spawn_mock(StatusCode::OK, r#"{"content":[{"type":"text","text":"hi"}]}"#).await;
        let (store, vault) = test_parts().await;
        credential(&vault, "anthropic", Some(format!("{}/v1/messages", mock.base_url)), true).await;
        store.save_agent(&agent("a", "claude-3-haiku", true)).await.unwrap();

        let history = vec![ConversationTurn::user("q1"), ConversationTurn::assistant("a1")];
        let reply = dispatcher(&store, &vault).dispatch("a", "q2", &history).await.unwrap();
        assert_eq!(reply, "hi");

        let call = &mock.calls()[0];
        assert_eq!(call.headers["x-api-key"], "sk-test");
        assert_eq!(call.headers["anthropic-version"], "2023-06-01");
        assert!(call.headers.get("authorization").is_none());
        assert_eq!(call.body["system"], "Be terse.");
        assert_eq!(call.body["messages"][2], json!({ "role": "user", "content": "q2" }));
    }

    #[tokio::test]
    async fn google_call_puts_key_in_query_and_model_in_path() {
        let mock = spawn_mock(
            StatusCode::OK,
            r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#,
        )
        .await;
        let (store, vault) = test_parts().await;
        credential(
            &vault,
            "google",
            Some(format!("{}/v1beta/models/{{model}}:generateContent", mock.base_url)),
            true,
        )
        .await;
        store.save_agent(&agent("a", "gemini-pro", true)).await.unwrap();

        let reply = dispatcher(&store, &vault).dispatch("a", "hello", &[]).await.unwrap();
        assert_eq!(reply, "hi");

        let call = &mock.calls()[0];
        assert_eq!(call.path, "/v1beta/models/gemini-pro:generateContent");
        assert_eq!(call.query.as_deref(), Some("key=sk-test"));
        assert_eq!(call.body["contents"][0]["parts"][0]["text"], "Be terse.\n\nhello");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (store, vault) = test_parts().await;
        credential(&vault, "deepseek", Some(format!("http://{}/v1/chat/completions", addr)), true).await;
        store.save_agent(&agent("a", "deepseek-chat", true)).await.unwrap();

        let err = dispatcher(&store, &vault).dispatch("a", "hi", &[]).await.unwrap_err();
        assert_eq!(err.kind(), "transport_error");
    }

    #[tokio::test]
    async fn query_param_key_stays_out_of_transport_errors() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (store, vault) = test_parts().await;
        credential(
            &vault,
            "google",
            Some(format!("http://{}/v1beta/models/{{model}}:generateContent", addr)),
            true,
        )
        .await;
        store.save_agent(&agent("a", "gemini-pro", true)).await.unwrap();
        let dispatcher = dispatcher(&store, &vault);

        let err = dispatcher.dispatch("a", "hi", &[]).await.unwrap_err();
        assert_eq!(err.kind(), "transport_error");
        assert!(!err.to_string().contains("sk-test"), "{}", err);
        assert!(!format!("{:?}", err).contains("sk-test"));

        let err = dispatcher.test_connection(Provider::Google).await.unwrap_err();
        assert_eq!(err.kind(), "transport_error");
        assert!(!err.to_string().contains("sk-test"), "{}", err);
    }

    #[tokio::test]
    async fn connection_test_hits_models_on_override_origin() {
        let mock = spawn_mock(StatusCode::OK, r#"{"data":[]}"#).await;
        let (store, vault) = test_parts().await;
        credential(
            &vault,
            "openai",
            Some(format!("{}/v1/chat/completions", mock.base_url)),
            true,
        )
        .await;

        let result = dispatcher(&store, &vault)
            .test_connection(Provider::OpenAi)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.http_status, 200);
        assert_eq!(mock.calls()[0].path, "/v1/models");
    }

    #[tokio::test]
    async fn connection_test_reports_rejected_key() {
        let mock = spawn_mock(StatusCode::FORBIDDEN, r#"{"error":"denied"}"#).await;
        let (store, vault) = test_parts().await;
        credential(&vault, "google", Some(mock.base_url.clone()), true).await;

        let result = dispatcher(&store, &vault)
            .test_connection(Provider::Google)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.http_status, 403);
        assert_eq!(mock.calls()[0].query.as_deref(), Some("key=sk-test"));
    }
}
