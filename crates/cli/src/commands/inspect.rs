//! `sam inspect` — Show embedded or canonical state.

use std::path::Path;
use std::sync::Arc;

use sam_core::{MessageStore, State, SystemClock, VariableStore};
use sam_reconcile::Reconciler;
use sam_script::parse_block;
use sam_store::FileChat;

pub async fn run(path: &Path, index: Option<usize>, canonical: bool) -> Result<(), Box<dyn std::error::Error>> {
    let chat = Arc::new(FileChat::open(path)?);

    if canonical {
        println!("📦 Canonical state of {}", chat.conversation_id().await?);
        println!("{}", serde_json::to_string_pretty(&chat.variables().await?)?);
        return Ok(());
    }

    let found = match index {
        Some(index) => {
            let message = chat.message(index).await?;
            parse_block(message.active_text()).map(|state| (index, state))
        }
        None => {
            Reconciler::for_host(Arc::clone(&chat), Arc::new(SystemClock))
                .latest_state()
                .await?
        }
    };

    match found {
        Some((index, state)) => {
            println!("📦 State embedded in message {index}");
            print_state(&state)?;
        }
        None => println!("No embedded state found"),
    }
    Ok(())
}

fn print_state(state: &State) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(state)?);
    println!();
    println!("   Variables:  {}", state.vars.len());
    println!("   Scheduled:  {}", state.volatile.len());
    println!("   Summaries:  {}", state.response_summary.len());
    Ok(())
}
