//! `sam process|reload|swipe|edit` — run the reconciliation handlers on a
//! chat file.
//!
//! Each invocation opens the chat the way a host does when a chat is
//! selected (a chat-changed reload), then performs the requested action.
//! A message that already carries its block is therefore never reprocessed
//! by `sam process`.

use std::path::Path;
use std::sync::Arc;

use sam_config::SamConfig;
use sam_core::{HostError, MessageStore, SystemClock};
use sam_reconcile::{Outcome, ReconcileOptions, Reconciler};
use sam_store::FileChat;

struct OpenChat {
    chat: Arc<FileChat>,
    reconciler: Reconciler,
}

async fn open(path: &Path, config: &SamConfig) -> Result<OpenChat, Box<dyn std::error::Error>> {
    let chat = Arc::new(FileChat::open(path)?);
    let reconciler = Reconciler::for_host(Arc::clone(&chat), Arc::new(SystemClock))
        .with_options(ReconcileOptions::from(&config.reconcile));
    reconciler.on_chat_changed().await?;
    Ok(OpenChat { chat, reconciler })
}

async fn default_index(chat: &FileChat, index: Option<usize>) -> Result<usize, Box<dyn std::error::Error>> {
    match index {
        Some(index) => Ok(index),
        None => chat
            .last_index()
            .await?
            .ok_or_else(|| format!("{} has no messages", chat.path().display()).into()),
    }
}

fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Processed { report, .. } => {
            println!("✅ {outcome}");
            for (command, result) in &report.entries {
                println!("   {command}  →  {result:?}");
            }
        }
        Outcome::Skipped(_) => println!("⏭️  {outcome}"),
        Outcome::Failed(_) => println!("❌ {outcome}"),
        _ => println!("🔄 {outcome}"),
    }
}

pub async fn process(
    path: &Path,
    index: Option<usize>,
    config: &SamConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let OpenChat { reconciler, .. } = open(path, config).await?;
    let outcome = match index {
        Some(index) => reconciler.process_message(index).await?,
        None => reconciler.on_generation_ended().await?,
    };
    report(&outcome);
    Ok(())
}

pub async fn reload(
    path: &Path,
    index: Option<usize>,
    config: &SamConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let chat = Arc::new(FileChat::open(path)?);
    let reconciler = Reconciler::for_host(Arc::clone(&chat), Arc::new(SystemClock))
        .with_options(ReconcileOptions::from(&config.reconcile));
    let outcome = match index {
        Some(index) => reconciler.reload_from(index).await?,
        None => reconciler.on_chat_changed().await?,
    };
    report(&outcome);
    Ok(())
}

pub async fn swipe(
    path: &Path,
    index: Option<usize>,
    to: Option<usize>,
    config: &SamConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let OpenChat { chat, reconciler } = open(path, config).await?;
    let index = default_index(&chat, index).await?;

    if let Some(to) = to {
        chat.update(|t| {
            if t.message_mut(index)?.select_swipe(to) {
                Ok(())
            } else {
                Err(HostError::Storage(format!("message {index} has no swipe {to}")))
            }
        })
        .await?;
    }

    report(&reconciler.on_swipe(index).await?);
    Ok(())
}

pub async fn edit(
    path: &Path,
    index: Option<usize>,
    text: Option<String>,
    config: &SamConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let OpenChat { chat, reconciler } = open(path, config).await?;
    let index = default_index(&chat, index).await?;

    if let Some(text) = text {
        chat.update(|t| {
            t.message_mut(index)?.set_text(text);
            Ok(())
        })
        .await?;
    }

    report(&reconciler.on_edit(index).await?);
    Ok(())
}
