use anyhow::Result;
use console::style;

use super::{Backend, GlobalFlags, flag_value, has_flag, positionals};
use crate::core::store::types::AgentInput;
use crate::core::terminal::{GuideSection, print_error, print_success};

fn print_usage() {
    println!("{}", style("Usage: flowdesk agent <command> [agent_id]").bold());
    println!("  • list                 List agent personas");
    println!("  • show   <agent_id>    Show one persona");
    println!("  • add    <agent_id>    Create or update a persona");
    println!("           --name <n> --model <m> --prompt <p> --persona <type>");
    println!("           [--provider <p>] [--description <d>] [--inactive]");
    println!("  • remove <agent_id>    Remove a persona permanently");
}

pub async fn run_agent_command(flags: &GlobalFlags, args: &[String]) -> Result<()> {
    let words = positionals(args, &["--inactive"]);
    let sub_cmd = words.first().map(String::as_str).unwrap_or("");
    let agent_id = words.get(1).cloned().unwrap_or_default();

    if !matches!(sub_cmd, "list" | "ls" | "show" | "add" | "set" | "remove" | "delete" | "rm") {
        print_usage();
        return Ok(());
    }
    let backend = Backend::open(flags).await?;

    match sub_cmd {
        "list" | "ls" => {
            let agents = backend.store.list_agents().await?;
            if agents.is_empty() {
                println!("No agent personas configured.");
                return Ok(());
            }
            let mut section = GuideSection::new("Agent personas");
            for agent in &agents {
                let provider = agent.provider.map(|p| p.as_str()).unwrap_or("unresolved");
                let state = if agent.active { "active" } else { "inactive" };
                section = section.status(
                    &agent.agent_id,
                    &format!("{} ({}, {}, {})", agent.name, agent.target_model, provider, state),
                );
            }
            section.print();
        }
        "show" => match backend.store.get_agent(&agent_id).await? {
            Some(agent) => println!("{}", serde_json::to_string_pretty(&agent)?),
            None => print_error(&format!("Agent '{}' not found.", agent_id)),
        },
        "add" | "set" => {
            let existing = backend.store.get_agent(&agent_id).await?;
            let pick = |names: &[&str], current: Option<&str>| {
                flag_value(args, names).or_else(|| current.map(str::to_string)).unwrap_or_default()
            };
            let input = AgentInput {
                agent_id: agent_id.clone(),
                name: pick(&["--name", "-n"], existing.as_ref().map(|a| a.name.as_str())),
                description: pick(
                    &["--description", "-d"],
                    existing.as_ref().map(|a| a.description.as_str()),
                ),
                system_prompt: pick(
                    &["--prompt", "-p"],
                    existing.as_ref().map(|a| a.system_prompt.as_str()),
                ),
                target_model: pick(
                    &["--model", "-m"],
                    existing.as_ref().map(|a| a.target_model.as_str()),
                ),
                provider: flag_value(args, &["--provider"]),
                active: !has_flag(args, &["--inactive"]),
                persona_type: flag_value(args, &["--persona"])
                    .or_else(|| existing.as_ref().map(|a| a.persona_type.as_str().to_string())),
            };
            match backend.store.save_agent(&input).await {
                Ok(agent) => print_success(&format!(
                    "Agent '{}' saved (provider: {}).",
                    agent.agent_id,
                    agent.provider.map(|p| p.as_str()).unwrap_or("unresolved")
                )),
                Err(e) => print_error(&format!("Error: {}", e)),
            }
        }
        _ => {
            if backend.store.delete_agent(&agent_id).await? {
                print_success(&format!("Agent '{}' removed successfully.", agent_id));
            } else {
                print_error(&format!("Agent '{}' not found.", agent_id));
            }
        }
    }
    Ok(())
}
