mod agent_cmd;
mod chat;
mod credentials;
mod serve;
mod tokens;

use std::sync::Arc;

use anyhow::Result;
use console::style;

use crate::core::config::{CliOverrides, GatewayConfig};
use crate::core::store::Store;
use crate::core::terminal::{self, GuideSection, print_error};
use crate::core::vault::{self, CredentialVault};
use crate::logging;
use crate::platform::{NativePlatform, Platform};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Server")
        .command("serve", "Start the HTTP API")
        .print();

    GuideSection::new("Personas")
        .command("chat", "Send one message to an agent persona")
        .command("agent", "List, add, show or remove agent personas")
        .print();

    GuideSection::new("Access")
        .command("credential", "Manage provider credentials")
        .command("token", "Manage API bearer tokens")
        .print();

    GuideSection::new("Global flags")
        .text("--api-host <host>   Bind address (default 127.0.0.1)")
        .text("--api-port <port>   Bind port (default 17890)")
        .text("--verbose, -v       Debug-level logging")
        .print();

    println!(
        "\n {} {} <command> [subcommand]\n",
        style("Usage:").bold(),
        style("flowdesk").green()
    );
}

/// Flags accepted anywhere on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GlobalFlags {
    pub api_host: Option<String>,
    pub api_port: Option<u16>,
    pub verbose: bool,
}

/// Splits global flags out of `args`, returning them with the remaining
/// positional arguments and command-specific flags in order.
pub(crate) fn parse_global_flags(args: &[String]) -> Result<(GlobalFlags, Vec<String>)> {
    let mut flags = GlobalFlags::default();
    let mut rest = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api-host" => {
                let Some(host) = args.get(i + 1) else {
                    anyhow::bail!("--api-host needs a value");
                };
                flags.api_host = Some(host.clone());
                i += 2;
            }
            "--api-port" => {
                let Some(port) = args.get(i + 1) else {
                    anyhow::bail!("--api-port needs a value");
                };
                flags.api_port = Some(
                    port.parse()
                        .map_err(|_| anyhow::anyhow!("invalid --api-port '{}'", port))?,
                );
                i += 2;
            }
            "--verbose" | "-v" => {
                flags.verbose = true;
                i += 1;
            }
            _ => {
                rest.push(args[i].clone());
                i += 1;
            }
        }
    }
    Ok((flags, rest))
}

/// Value of `--name <value>` (or its short form) among command arguments.
pub(crate) fn flag_value(args: &[String], names: &[&str]) -> Option<String> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .cloned()
}

pub(crate) fn has_flag(args: &[String], names: &[&str]) -> bool {
    args.iter().any(|a| names.contains(&a.as_str()))
}

/// Positional arguments after the subcommand, skipping `--flag value` pairs
/// and the listed boolean switches.
pub(crate) fn positionals(args: &[String], switches: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if switches.contains(&arg) {
            i += 1;
        } else if arg.starts_with("--") {
            i += 2;
        } else {
            out.push(args[i].clone());
            i += 1;
        }
    }
    out
}

/// Store and vault opened against the configured data directory.
pub(crate) struct Backend {
    pub config: GatewayConfig,
    pub store: Store,
    pub vault: Arc<CredentialVault>,
}

impl Backend {
    pub async fn open(flags: &GlobalFlags) -> Result<Self> {
        let overrides = CliOverrides {
            api_host: flags.api_host.clone(),
            api_port: flags.api_port,
        };
        let config = GatewayConfig::load(&NativePlatform::data_dir(), &overrides).await?;
        let store = Store::open(&config.db_path()).await?;

        let key = match &config.master_key {
            Some(passphrase) => vault::passphrase_key(passphrase)?,
            None => vault::machine_key()?,
        };
        let vault = Arc::new(CredentialVault::new(store.get_db(), key));
        vault.initialize().await?;

        Ok(Self {
            config,
            store,
            vault,
        })
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (flags, rest) = parse_global_flags(&args)?;

    let Some(cmd) = rest.first().map(String::as_str) else {
        print_help();
        return Ok(());
    };
    let sub_args = &rest[1..];

    match cmd {
        "serve" => {
            let log_tx = logging::init(flags.verbose, false);
            let backend = Backend::open(&flags).await?;
            serve::run_serve(backend, log_tx).await
        }
        "chat" => {
            logging::init(flags.verbose, !flags.verbose);
            chat::run_chat_command(&flags, sub_args).await
        }
        "agent" | "agents" => {
            logging::init(flags.verbose, !flags.verbose);
            agent_cmd::run_agent_command(&flags, sub_args).await
        }
        "credential" | "credentials" => {
            logging::init(flags.verbose, !flags.verbose);
            credentials::run_credential_command(&flags, sub_args).await
        }
        "token" | "tokens" => {
            logging::init(flags.verbose, !flags.verbose);
            tokens::run_token_command(&flags, sub_args).await
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
