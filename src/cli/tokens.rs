use anyhow::Result;
use console::style;

use super::{Backend, GlobalFlags, positionals};
use crate::core::terminal::{GuideSection, print_error, print_success};

fn print_usage() {
    println!("{}", style("Usage: flowdesk token <command>").bold());
    println!("  • create <name>   Issue a new API bearer token");
    println!("  • list            List issued tokens");
    println!("  • revoke <id>     Revoke a token");
}

pub async fn run_token_command(flags: &GlobalFlags, args: &[String]) -> Result<()> {
    let words = positionals(args, &[]);
    let sub_cmd = words.first().map(String::as_str).unwrap_or("");
    let target = words.get(1).cloned().unwrap_or_default();

    if !matches!(sub_cmd, "create" | "list" | "ls" | "revoke" | "delete" | "rm") {
        print_usage();
        return Ok(());
    }
    let backend = Backend::open(flags).await?;

    match sub_cmd {
        "create" => {
            if target.trim().is_empty() {
                println!("{}", style("Usage: flowdesk token create <name>").bold());
                return Ok(());
            }
            let (token, record) = backend.store.create_api_token(&target).await?;
            println!();
            print_success(&format!("API token '{}' created ({}).", record.name, record.id));
            println!(
                "\n  {} {}\n",
                style("Token:").bold(),
                style(&token).green().bold()
            );
            println!(
                "  {} Save this token now. It will not be shown again.",
                style("⚠").yellow()
            );
            println!(
                "  {} Use it with: Authorization: Bearer {}\n",
                style("→").cyan(),
                token
            );
        }
        "list" | "ls" => {
            let tokens = backend.store.list_api_tokens().await?;
            if tokens.is_empty() {
                println!("No API tokens issued. The API is open on loopback only.");
                return Ok(());
            }
            let mut section = GuideSection::new("API tokens");
            for t in &tokens {
                section = section.status(&t.name, &format!("{} (created {})", t.id, t.created_at));
            }
            section.print();
        }
        _ => {
            if backend.store.delete_api_token(&target).await? {
                print_success(&format!("Token '{}' revoked.", target));
            } else {
                print_error(&format!("Token '{}' not found.", target));
            }
        }
    }
    Ok(())
}
