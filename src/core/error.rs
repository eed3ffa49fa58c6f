use thiserror::Error;

use crate::core::llm::Provider;

/// Rejected caller input raised inside `anyhow`-returning store code, so the
/// HTTP layer can tell it apart from storage failures by downcasting.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InvalidInput(pub String);

pub fn invalid(message: impl Into<String>) -> anyhow::Error {
    InvalidInput(message.into()).into()
}

pub fn is_invalid_input(err: &anyhow::Error) -> bool {
    err.downcast_ref::<InvalidInput>().is_some()
}

/// Failures surfaced by the dispatch path. Every variant maps to a stable
/// `kind()` tag so HTTP callers can branch without string matching.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("agent '{0}' is inactive")]
    Inactive(String),

    #[error("unsupported model '{0}': no provider family matches it")]
    UnsupportedModel(String),

    #[error("{provider} returned HTTP {http_status}: {provider_message}")]
    Provider {
        provider: Provider,
        http_status: u16,
        provider_message: String,
    },

    #[error("unexpected {provider} response shape: {detail}")]
    MalformedResponse { provider: Provider, detail: String },

    #[error("request to {provider} failed: {message}")]
    Transport { provider: Provider, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Validation(_) => "validation_error",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::Inactive(_) => "inactive",
            DispatchError::UnsupportedModel(_) => "unsupported_model",
            DispatchError::Provider { .. } => "provider_error",
            DispatchError::MalformedResponse { .. } => "malformed_provider_response",
            DispatchError::Transport { .. } => "transport_error",
            DispatchError::Storage(_) => "storage_error",
        }
    }

    /// The request URL is stripped: query-param auth carries the key in it.
    pub(crate) fn transport(provider: Provider, err: reqwest::Error) -> Self {
        let err = err.without_url();
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        DispatchError::Transport { provider, message }
    }

    pub(crate) fn malformed(provider: Provider, detail: impl Into<String>) -> Self {
        DispatchError::MalformedResponse {
            provider,
            detail: detail.into(),
        }
    }
}
