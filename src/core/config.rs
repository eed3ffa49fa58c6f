use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_API_PORT: u16 = 17890;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const CONFIG_FILE: &str = "config.toml";
pub const DB_FILE: &str = "flowdesk.db";

/// Optional keys read from `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_host: Option<String>,
    pub api_port: Option<u16>,
    pub request_timeout_secs: Option<u64>,
    pub access_key: Option<String>,
    pub master_key: Option<String>,
}

/// Flag values from the command line; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_host: Option<String>,
    pub api_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub data_dir: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub request_timeout_secs: u64,
    pub access_key: Option<String>,
    pub master_key: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl GatewayConfig {
    pub fn defaults(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: DEFAULT_API_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            access_key: None,
            master_key: None,
        }
    }

    /// Defaults, then `config.toml`, then environment, then CLI flags.
    pub async fn load(data_dir: &Path, cli: &CliOverrides) -> Result<Self> {
        let mut config = Self::defaults(data_dir.to_path_buf());

        let path = data_dir.join(CONFIG_FILE);
        if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {:?}", path))?;
            let file: FileConfig =
                toml::from_str(&content).with_context(|| format!("parsing {:?}", path))?;
            config.apply_file(file);
            info!("Loaded configuration from {:?}", path);
        }

        config.apply_env(|name| std::env::var(name).ok());
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(host) = non_empty(file.api_host) {
            self.api_host = host;
        }
        if let Some(port) = file.api_port {
            self.api_port = port;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(key) = non_empty(file.access_key) {
            self.access_key = Some(key);
        }
        if let Some(key) = non_empty(file.master_key) {
            self.master_key = Some(key);
        }
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = non_empty(lookup("FLOWDESK_ACCESS_KEY")) {
            self.access_key = Some(key);
        }
        if let Some(key) = non_empty(lookup("FLOWDESK_MASTER_KEY")) {
            self.master_key = Some(key);
        }
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(host) = non_empty(cli.api_host.clone()) {
            self.api_host = host;
        }
        if let Some(port) = cli.api_port {
            self.api_port = port;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}
