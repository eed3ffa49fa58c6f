use anyhow::Result;
use console::style;

use super::{Backend, GlobalFlags, flag_value, has_flag, positionals};
use crate::core::dispatch::Dispatcher;
use crate::core::llm::Provider;
use crate::core::terminal::{GuideSection, print_error, print_success};
use crate::core::vault::CredentialInput;

fn print_usage() {
    println!("{}", style("Usage: flowdesk credential <command>").bold());
    println!("  • list                    List stored credentials (secrets are never shown)");
    println!("  • set    <provider>       Store or replace a provider API key");
    println!("           --secret <key> [--endpoint <url>] [--inactive]");
    println!("  • test   <provider>       Check the key against the provider's models endpoint");
    println!("  • remove <credential_id>  Delete a credential");
}

pub async fn run_credential_command(flags: &GlobalFlags, args: &[String]) -> Result<()> {
    let words = positionals(args, &["--inactive"]);
    let sub_cmd = words.first().map(String::as_str).unwrap_or("");
    let target = words.get(1).cloned().unwrap_or_default();

    if !matches!(sub_cmd, "list" | "ls" | "set" | "add" | "test" | "remove" | "delete" | "rm") {
        print_usage();
        return Ok(());
    }
    let backend = Backend::open(flags).await?;

    match sub_cmd {
        "list" | "ls" => {
            let credentials = backend.vault.list_credentials().await?;
            if credentials.is_empty() {
                println!("No provider credentials stored.");
                return Ok(());
            }
            let mut section = GuideSection::new("Provider credentials");
            for c in &credentials {
                let endpoint = c.endpoint_override.as_deref().unwrap_or("default endpoint");
                let state = if c.active { "active" } else { "inactive" };
                section = section.status(c.provider.as_str(), &format!("{} ({}, {})", c.id, endpoint, state));
            }
            section.print();
        }
        "set" | "add" => {
            let input = CredentialInput {
                provider: target.clone(),
                secret: flag_value(args, &["--secret", "-s"]).unwrap_or_default(),
                endpoint_override: flag_value(args, &["--endpoint"]),
                active: !has_flag(args, &["--inactive"]),
                ..Default::default()
            };
            match backend.vault.save_credential(&input).await {
                Ok(saved) => print_success(&format!(
                    "Credential for '{}' stored ({}).",
                    saved.provider, saved.id
                )),
                Err(e) => print_error(&format!("Error: {}", e)),
            }
        }
        "test" => {
            let Some(provider) = Provider::from_id(&target) else {
                print_error(&format!("Unknown provider '{}'.", target));
                return Ok(());
            };
            let dispatcher = Dispatcher::new(
                backend.store,
                backend.vault,
                backend.config.request_timeout(),
            )?;
            match dispatcher.test_connection(provider).await {
                Ok(result) if result.success => print_success(&format!(
                    "{} answered HTTP {}.",
                    provider, result.http_status
                )),
                Ok(result) => print_error(&format!(
                    "{} answered HTTP {}.",
                    provider, result.http_status
                )),
                Err(e) => print_error(&format!("[{}] {}", e.kind(), e)),
            }
        }
        _ => {
            if backend.vault.delete_credential(&target).await? {
                print_success(&format!("Credential '{}' removed.", target));
            } else {
                print_error(&format!("Credential '{}' not found.", target));
            }
        }
    }
    Ok(())
}
