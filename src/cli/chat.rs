use anyhow::Result;
use console::style;

use super::{Backend, GlobalFlags, positionals};
use crate::core::dispatch::Dispatcher;
use crate::core::error::DispatchError;

pub async fn run_chat_command(flags: &GlobalFlags, args: &[String]) -> Result<()> {
    let words = positionals(args, &[]);
    let Some((agent_id, message)) = words.split_first() else {
        println!("{}", style("Usage: flowdesk chat <agent_id> <message...>").bold());
        return Ok(());
    };
    if message.is_empty() {
        println!("{}", style("Usage: flowdesk chat <agent_id> <message...>").bold());
        return Ok(());
    }

    let backend = Backend::open(flags).await?;
    let dispatcher = Dispatcher::new(
        backend.store,
        backend.vault,
        backend.config.request_timeout(),
    )?;

    let reply = tagged(dispatcher.dispatch(agent_id, &message.join(" "), &[]).await)?;
    println!("{}", reply);
    Ok(())
}

/// Prefixes a dispatch failure with its kind so the process exits non-zero.
fn tagged(result: std::result::Result<String, DispatchError>) -> Result<String> {
    result.map_err(|e| anyhow::anyhow!("[{}] {}", e.kind(), e))
}
