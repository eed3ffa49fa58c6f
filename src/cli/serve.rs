use std::sync::Arc;

use anyhow::Result;
use console::style;
use tokio::sync::Mutex;
use tracing::info;

use super::Backend;
use crate::core::dispatch::Dispatcher;
use crate::core::lifecycle::LifecycleManager;
use crate::core::terminal::GuideSection;
use crate::interfaces::web::{ApiServer, ApiServerConfig};

pub async fn run_serve(backend: Backend, log_tx: tokio::sync::broadcast::Sender<String>) -> Result<()> {
    let Backend {
        config,
        store,
        vault,
    } = backend;

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        vault.clone(),
        config.request_timeout(),
    )?);

    let server = ApiServer::new(ApiServerConfig {
        store,
        vault,
        dispatcher,
        log_tx,
        api_host: config.api_host.clone(),
        api_port: config.api_port,
        access_key: config.access_key.clone(),
    });

    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(Arc::new(Mutex::new(server)));
    lifecycle.start().await?;

    GuideSection::new("flowdesk API")
        .status(
            "Endpoint",
            &format!(
                "{}",
                style(format!("http://{}:{}/api", config.api_host, config.api_port))
                    .underlined()
                    .cyan()
            ),
        )
        .status("Data", &config.data_dir.display().to_string())
        .blank()
        .status(
            "Press Ctrl+C to stop the server.",
            &format!("{}", style("Ctrl+C").bold().yellow()),
        )
        .print();
    println!();

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, stopping");
    lifecycle.shutdown().await
}
