pub(crate) mod auth;
mod handlers;
pub(crate) mod router;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::core::dispatch::Dispatcher;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::Store;
use crate::core::vault::CredentialVault;

pub struct ApiServer {
    config: ApiServerConfig,
    handle: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct ApiServerConfig {
    pub store: Store,
    pub vault: Arc<CredentialVault>,
    pub dispatcher: Arc<Dispatcher>,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub api_host: String,
    pub api_port: u16,
    pub access_key: Option<String>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Store,
    pub(crate) vault: Arc<CredentialVault>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) api_host: String,
    pub(crate) api_port: u16,
    pub(crate) access_key: Option<String>,
}

impl From<ApiServerConfig> for AppState {
    fn from(config: ApiServerConfig) -> Self {
        Self {
            store: config.store,
            vault: config.vault,
            dispatcher: config.dispatcher,
            log_tx: config.log_tx,
            api_host: config.api_host,
            api_port: config.api_port,
            access_key: config.access_key.filter(|k| !k.is_empty()),
        }
    }
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            config,
            handle: None,
        }
    }
}

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.config.api_host, self.config.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind API server to {}", addr))?;
        let app = router::build_api_router(AppState::from(self.config.clone()));

        info!("API Server running at http://{addr}");
        self.handle = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        Ok(())
    }
}
