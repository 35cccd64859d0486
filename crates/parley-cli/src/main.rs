//! parley - chat with OpenAI-compatible model servers from the terminal

mod commands;
mod config;

use clap::{Parser, Subcommand};
use parley_ai::OpenAICompatProvider;
use parley_chat::{ConversationStore, FileStorage};
use std::path::PathBuf;
use std::sync::Arc;

use commands::Context;

/// parley - persisted chat conversations with streaming replies
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: llama3.2)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Server base URL (default: http://localhost:11434)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API key sent as a bearer token
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Directory holding saved conversations
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an empty conversation and print its id
    New {
        #[arg(short, long)]
        title: Option<String>,
    },
    /// List saved conversations, newest first
    List,
    /// Print a conversation's messages
    Show { id: String },
    /// Send a prompt and stream the reply (Ctrl-C stops generating)
    Chat {
        /// Conversation id or prefix; a new conversation when omitted
        #[arg(short, long)]
        conversation: Option<String>,
        prompt: String,
    },
    /// Rewrite message INDEX, drop the messages after it, and regenerate
    Edit {
        id: String,
        index: usize,
        text: String,
    },
    /// Rename a conversation
    Rename { id: String, title: String },
    /// Delete a conversation
    Delete { id: String },
    /// List models offered by the server
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing; stderr keeps streamed replies on stdout clean
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("parley=debug,parley_ai=debug,parley_chat=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let Some(command) = args.command else {
        eprintln!("Nothing to do. Try `parley chat \"Hello\"` or `parley --help`.");
        return Ok(());
    };

    // Merge config with CLI args (CLI takes precedence)
    let cfg = config::Config::load();
    let data_dir = cfg.data_dir(args.data_dir);
    let client_config = cfg.client_config(args.base_url, args.api_key);
    let model = cfg.model(args.model);

    tracing::debug!(base_url = %client_config.base_url, model = %model, data_dir = %data_dir.display(), "Starting");

    let storage = FileStorage::new(&data_dir)?;
    let ctx = Context {
        store: Arc::new(ConversationStore::open(Arc::new(storage))?),
        provider: Arc::new(OpenAICompatProvider::new(client_config)),
        model,
    };

    match command {
        Command::New { title } => commands::conversation::new(&ctx, title),
        Command::List => commands::conversation::list(&ctx, &data_dir),
        Command::Show { id } => commands::conversation::show(&ctx, &id),
        Command::Chat {
            conversation,
            prompt,
        } => commands::chat::chat(&ctx, conversation.as_deref(), &prompt).await,
        Command::Edit { id, index, text } => commands::chat::edit(&ctx, &id, index, &text).await,
        Command::Rename { id, title } => commands::conversation::rename(&ctx, &id, &title),
        Command::Delete { id } => commands::conversation::delete(&ctx, &id),
        Command::Models => commands::model::models(&ctx).await,
    }
}
