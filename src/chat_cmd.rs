//! Interactive commands: `ask`, `chat` and `models`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use ragchat_core::models::RetrievedSource;

use crate::app::App;
use crate::llm::ChatModel;
use crate::session::{ChatSession, UploadOutcome, WELCOME_MESSAGE};

const HELP: &str = "Commands:
  /upload <path>   add a .pdf or .txt file to the documents
  /sources         show the sources behind the last answer
  /clear           clear the chat history
  /new             archive the documents and start a new session
  /forget          delete the documents without archiving
  /help            show this help
  /quit            exit";

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum ReplInput {
    Message(String),
    Upload(PathBuf),
    Sources,
    Clear,
    New,
    Forget,
    Help,
    Quit,
    Unknown(String),
}

impl ReplInput {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(ReplInput::Message(line.to_string()));
        };
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        Some(match name {
            "upload" if !arg.is_empty() => ReplInput::Upload(PathBuf::from(arg)),
            "sources" => ReplInput::Sources,
            "clear" => ReplInput::Clear,
            "new" => ReplInput::New,
            "forget" => ReplInput::Forget,
            "help" | "?" => ReplInput::Help,
            "quit" | "exit" | "q" => ReplInput::Quit,
            _ => ReplInput::Unknown(line.to_string()),
        })
    }
}

/// Answer one question and exit.
pub async fn run_ask(app: &App, question: &str, direct: bool) -> Result<()> {
    let mut stream = app.router.route(question, direct).await;
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        write!(stdout, "{}", fragment)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    print_sources(&app.router.last_sources());
    Ok(())
}

/// Echoes answer fragments as they arrive. The first write error stops
/// further output and is returned by [`finish`](Self::finish).
struct FragmentWriter<W: Write> {
    out: W,
    error: Option<std::io::Error>,
}

impl<W: Write> FragmentWriter<W> {
    fn new(out: W) -> Self {
        Self { out, error: None }
    }

    fn write(&mut self, fragment: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = write!(self.out, "{}", fragment).and_then(|_| self.out.flush()) {
            warn!(error = %e, "failed to write answer to stdout");
            self.error = Some(e);
        }
    }

    fn finish(self) -> std::io::Result<()> {
        self.error.map_or(Ok(()), Err)
    }
}

/// Interactive chat over stdin.
pub async fn run_chat(app: &App) -> Result<()> {
    let interactive = atty::is(atty::Stream::Stdin);
    let mut session = ChatSession::new(app.router.clone(), app.splitter.clone());
    let mut last_sources: Vec<RetrievedSource> = Vec::new();

    println!("{}\n", WELCOME_MESSAGE);
    if interactive {
        println!("Type /help for commands.\n");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(input) = ReplInput::parse(&line) else {
            continue;
        };

        match input {
            ReplInput::Message(prompt) => {
                let mut out = FragmentWriter::new(std::io::stdout());
                let reply = session.respond(&prompt, |fragment| out.write(fragment)).await;
                out.finish()?;
                println!("\n");
                if !reply.sources.is_empty() {
                    println!("({} sources, /sources to show)\n", reply.sources.len());
                }
                last_sources = reply.sources;
            }
            ReplInput::Upload(path) => upload(&mut session, &path).await,
            ReplInput::Sources => print_sources(&last_sources),
            ReplInput::Clear => {
                session.clear_chat();
                last_sources.clear();
                println!("Chat history cleared.\n");
            }
            ReplInput::New => {
                if session.new_session().await {
                    last_sources.clear();
                    println!("Documents archived. New session started.\n");
                } else {
                    println!("Archiving failed; documents were left in place.\n");
                }
            }
            ReplInput::Forget => {
                if session.clear_documents().await {
                    last_sources.clear();
                    println!("Documents cleared.\n");
                } else {
                    println!("Clearing documents failed.\n");
                }
            }
            ReplInput::Help => println!("{}\n", HELP),
            ReplInput::Quit => break,
            ReplInput::Unknown(line) => println!("Unknown command: {} (try /help)\n", line),
        }
    }
    Ok(())
}

async fn upload(session: &mut ChatSession, path: &Path) {
    let name = path.to_string_lossy().to_string();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("Could not read {}: {}\n", path.display(), e);
            return;
        }
    };
    match session.upload(&name, &bytes).await {
        Ok(UploadOutcome::Ingested { chunks }) => {
            println!("Processed {} ({} chunks).\n", path.display(), chunks)
        }
        Ok(UploadOutcome::AlreadyProcessed) => {
            println!("{} was already processed in this session.\n", path.display())
        }
        Err(e) => println!("Failed to process {}: {}\n", path.display(), e),
    }
}

fn print_sources(sources: &[RetrievedSource]) {
    if sources.is_empty() {
        return;
    }
    println!("---\nReference Documents:");
    for (idx, source) in sources.iter().enumerate() {
        match source.similarity_score {
            Some(score) => println!("\nSource {} (score {:.3})", idx + 1, score),
            None => println!("\nSource {}", idx + 1),
        }
        println!("{}", source.content);
        println!("  [{}]", source.metadata);
    }
    println!();
}

/// List models the server can serve, configured model first.
pub async fn run_models(model: &dyn ChatModel) -> Result<()> {
    let models = match model.list_models().await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => vec![model.name().to_string()],
        Err(e) => {
            warn!(error = %e, "could not list models, showing configured model only");
            vec![model.name().to_string()]
        }
    };
    for name in models {
        let marker = if name == model.name() { "*" } else { " " };
        println!("{} {}", marker, name);
    }
    Ok(())
}
