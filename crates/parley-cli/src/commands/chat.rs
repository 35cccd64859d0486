//! Streaming commands: chat and edit

use anyhow::bail;
use std::io::Write;

use super::{Context, with_interrupt};

fn print_fragment(fragment: &str) {
    print!("{}", fragment);
    let _ = std::io::stdout().flush();
}

/// Send `prompt` to a conversation (a new one if none is given) and stream
/// the reply to stdout.
pub async fn chat(ctx: &Context, conversation: Option<&str>, prompt: &str) -> anyhow::Result<()> {
    let id = match conversation {
        Some(query) => ctx.resolve(query)?,
        None => ctx.store.new_conversation()?,
    };
    ctx.store.set_active(Some(id.clone()));

    let responder = ctx.responder();
    let reply = with_interrupt(
        &responder,
        responder.send(&id, prompt, &ctx.model, print_fragment),
    )
    .await;
    println!();

    if reply?.is_none() {
        bail!("Conversation {} not found", id);
    }
    eprintln!("[conversation {}]", id);
    Ok(())
}

/// Replace message `index` with `text`, drop what followed, and stream a new
/// reply.
pub async fn edit(ctx: &Context, query: &str, index: usize, text: &str) -> anyhow::Result<()> {
    let id = ctx.resolve(query)?;
    ctx.store.set_active(Some(id.clone()));

    let responder = ctx.responder();
    let reply = with_interrupt(
        &responder,
        responder.edit_and_regenerate(&id, index, text, &ctx.model, print_fragment),
    )
    .await;
    println!();

    if reply?.is_none() {
        bail!("Conversation {} has no message {}", id, index);
    }
    Ok(())
}
