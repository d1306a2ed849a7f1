//! # ragchat CLI
//!
//! Chat with your documents using a local Ollama model.
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat init` | Create the active and archive databases |
//! | `ragchat ingest <paths...>` | Add `.pdf` / `.txt` files to the documents |
//! | `ragchat ask "<question>"` | Answer one question and exit |
//! | `ragchat chat` | Interactive chat session |
//! | `ragchat archive` | Move the documents into the archive collection |
//! | `ragchat clear` | Delete the documents without archiving |
//! | `ragchat status` | Show document counts and configuration |
//! | `ragchat models` | List locally available chat models |
//!
//! ## Examples
//!
//! ```bash
//! ragchat ingest ./handbook.pdf ./notes.txt
//! ragchat ask "What is the refund policy?"
//! ragchat --model mistral:7b chat
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ragchat::app::App;
use ragchat::llm::OllamaChat;
use ragchat::{chat_cmd, config, logging, store_cmd};

/// ragchat: a local retrieval-augmented chat assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file at the default location means built-in defaults.
#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "ragchat: chat with your documents using a local model",
    version,
    long_about = "ragchat indexes uploaded PDF and text files into a local vector store and \
    answers questions either from general knowledge or grounded in the retrieved documents, \
    with a relevance check deciding which."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Chat model to use instead of `llm.model`.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the active and archive databases.
    ///
    /// Idempotent: running it again is safe.
    Init,

    /// Ingest `.pdf` and `.txt` files.
    ///
    /// Each file is reported separately; other file types are rejected.
    /// Exits non-zero if any file failed.
    Ingest {
        /// Files to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Custom metadata tag attached to every chunk (repeatable).
        #[arg(long = "tag", value_parser = parse_key_val)]
        tags: Vec<(String, String)>,
    },

    /// Answer a single question.
    Ask {
        question: String,

        /// Skip the documents and answer from general knowledge.
        #[arg(long)]
        direct: bool,
    },

    /// Start an interactive chat session.
    Chat,

    /// Move all documents into the archive collection.
    Archive,

    /// Delete all documents without archiving them.
    Clear,

    /// Show document counts and configuration.
    Status,

    /// List chat models available on the local server.
    Models,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config(&cli.config)?;
    if let Some(model) = cli.model {
        cfg.llm.model = model;
    }
    logging::init(&cfg.logging.level)?;

    match cli.command {
        Commands::Init => store_cmd::run_init(&cfg).await?,
        Commands::Ingest { paths, tags } => store_cmd::run_ingest(&cfg, &paths, tags).await?,
        Commands::Ask { question, direct } => {
            let app = App::build(&cfg).await?;
            chat_cmd::run_ask(&app, &question, direct).await?;
        }
        Commands::Chat => {
            let app = App::build(&cfg).await?;
            chat_cmd::run_chat(&app).await?;
        }
        Commands::Archive => store_cmd::run_archive(&cfg).await?,
        Commands::Clear => store_cmd::run_clear(&cfg).await?,
        Commands::Status => store_cmd::run_status(&cfg).await?,
        Commands::Models => {
            let model = OllamaChat::new(&cfg.llm)?;
            chat_cmd::run_models(&model).await?;
        }
    }

    Ok(())
}
