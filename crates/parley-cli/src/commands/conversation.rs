//! Conversation management: new, list, show, rename, delete

use anyhow::bail;
use parley_chat::Conversation;

use super::{Context, short_id};

pub fn new(ctx: &Context, title: Option<String>) -> anyhow::Result<()> {
    let id = match title {
        Some(title) => ctx.store.create_conversation(title)?,
        None => ctx.store.new_conversation()?,
    };
    println!("{}", id);
    Ok(())
}

pub fn list(ctx: &Context, data_dir: &std::path::Path) -> anyhow::Result<()> {
    let conversations = ctx.store.snapshot();
    if conversations.is_empty() {
        println!("No conversations yet.");
        println!("Conversations are stored in: {}", data_dir.display());
        return Ok(());
    }

    println!("{:<10} {:<18} {:<6} Title", "ID", "Created", "Msgs");
    println!("{}", "-".repeat(70));
    for c in &conversations {
        println!(
            "{:<10} {:<18} {:<6} {}",
            short_id(&c.id),
            created_at_display(c),
            c.messages.len(),
            c.title
        );
    }
    Ok(())
}

pub fn show(ctx: &Context, query: &str) -> anyhow::Result<()> {
    let id = ctx.resolve(query)?;
    let Some(conversation) = ctx.store.get(&id) else {
        bail!("Conversation {} disappeared", id);
    };

    println!("{}", conversation.title);
    println!("{} | created {}", conversation.id, created_at_display(&conversation));
    println!("{}", "-".repeat(40));

    for (index, message) in conversation.messages.iter().enumerate() {
        let mut header = format!("[{}] {}", index, message.role);
        if let Some(model) = &message.model {
            header.push_str(&format!(" ({})", model));
        }
        if message.is_edited() {
            header.push_str(" [edited]");
        }
        println!("{}\n{}\n", header, message.content);
    }
    Ok(())
}

pub fn rename(ctx: &Context, query: &str, title: &str) -> anyhow::Result<()> {
    let id = ctx.resolve(query)?;
    if !ctx.store.change_title(&id, title)? {
        bail!("Only conversations with messages can be renamed");
    }
    Ok(())
}

pub fn delete(ctx: &Context, query: &str) -> anyhow::Result<()> {
    let id = ctx.resolve(query)?;
    ctx.store.delete_conversation(&id)?;
    println!("Deleted {}", id);
    Ok(())
}

fn created_at_display(conversation: &Conversation) -> String {
    conversation
        .created_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
