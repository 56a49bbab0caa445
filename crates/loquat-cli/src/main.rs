//! Loquat - Streaming chat client for the terminal
//!
//! Sends messages to a chat backend and prints the assistant reply as it
//! streams in. History and per-chat settings are exposed as subcommands.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use loquat_core::{
    paths, ChatApiClient, ChatSession, ClientConfig, PageLoad, Role, SendMessage, SessionEvent,
    StreamStatus,
};

/// Loquat - streaming chat client
#[derive(Parser)]
#[command(name = "loquat")]
#[command(about = "Chat with a streaming assistant backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides config and LOQUAT_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token (overrides LOQUAT_TOKEN; never stored)
    #[arg(long, global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message and stream the reply
    Send {
        message: String,
        /// Existing chat to continue; omitted starts a new chat
        #[arg(short, long)]
        chat: Option<String>,
        /// File to attach
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(long)]
        web_search: bool,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the history of a chat
    History {
        chat: String,
        /// Older pages to load after the newest one
        #[arg(short, long, default_value_t = 0)]
        pages: u32,
    },

    /// Toggle web search for a chat
    WebSearch { chat: String },

    /// Change the output token limit of a chat
    MaxTokens { chat: String, max_output_tokens: u32 },
}

/// Prints the streaming assistant message incrementally
#[derive(Default)]
struct Renderer {
    streaming: Option<usize>,
    printed: usize,
}

impl Renderer {
    fn render(&mut self, session: &ChatSession, event: SessionEvent) {
        match event {
            SessionEvent::MessageAppended { index } => {
                if session
                    .message(index)
                    .is_some_and(|m| m.role == Role::Assistant)
                {
                    self.streaming = Some(index);
                    self.printed = 0;
                }
            }
            SessionEvent::MessagesPrepended { count } => {
                self.streaming = self.streaming.map(|i| i + count);
            }
            SessionEvent::MessageUpdated { index } if Some(index) == self.streaming => {
                if let Some(message) = session.message(index) {
                    let mut stdout = std::io::stdout().lock();
                    let fresh = message.content.get(self.printed..).unwrap_or("");
                    let _ = stdout.write_all(fresh.as_bytes());
                    let _ = stdout.flush();
                    self.printed = message.content.len();
                }
            }
            SessionEvent::Navigate { chat_id } => {
                eprintln!("\n[chat {}]", chat_id);
            }
            SessionEvent::StreamFinished { status, .. } => {
                println!();
                if status == StreamStatus::Aborted {
                    eprintln!("[stopped]");
                }
                self.streaming = None;
            }
            SessionEvent::Error { message } => {
                eprintln!("error: {}", message);
            }
            _ => {}
        }
    }
}

fn init_logging() {
    let log_dir = paths::logs_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let Ok(log_file) = std::fs::File::create(log_dir.join("loquat.log")) else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
}

async fn send(
    session: &ChatSession,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    message: SendMessage,
) -> Result<()> {
    let mut renderer = Renderer::default();
    let handle = match session.send_message(message).await {
        Ok(handle) => handle,
        Err(e) => {
            while let Ok(event) = events.try_recv() {
                renderer.render(session, event);
            }
            return Err(e).context("Failed to send message");
        }
    };

    let mut wait = std::pin::pin!(handle.wait());
    let result = loop {
        tokio::select! {
            result = &mut wait => break result,
            Some(event) = events.recv() => renderer.render(session, event),
            _ = tokio::signal::ctrl_c() => session.stop(),
        }
    };
    while let Ok(event) = events.try_recv() {
        renderer.render(session, event);
    }

    let status = result.context("Assistant stream failed")?;
    let totals = session.token_totals();
    tracing::info!(
        "Stream finished with {:?} ({} prompt / {} completion tokens)",
        status,
        totals.prompt_tokens,
        totals.completion_tokens
    );
    Ok(())
}

async fn history(session: &ChatSession, chat_id: &str, pages: u32) -> Result<()> {
    session
        .open_chat(chat_id)
        .await
        .with_context(|| format!("Failed to load chat {}", chat_id))?;
    for _ in 0..pages {
        match session.load_older(chat_id).await? {
            PageLoad::Loaded(_) => {}
            PageLoad::Exhausted | PageLoad::Busy | PageLoad::Discarded => break,
        }
    }

    let metadata = session.metadata();
    let totals = session.token_totals();
    println!(
        "model: {}  max output tokens: {}  web search: {}",
        metadata.model.as_deref().unwrap_or("-"),
        metadata
            .max_output_tokens
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string()),
        if metadata.web_search { "on" } else { "off" }
    );
    println!(
        "tokens: {} prompt / {} completion",
        totals.prompt_tokens, totals.completion_tokens
    );
    println!();

    for message in session.messages() {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        match &message.file {
            Some(file) => println!("{} [{}]: {}", who, file, message.content),
            None => println!("{}: {}", who, message.content),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let mut config = ClientConfig::load()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(token) = cli.token {
        config.bearer_token = Some(token);
    }

    let client = ChatApiClient::new(&config).context("Invalid backend URL")?;
    let (session, mut events) = ChatSession::new(std::sync::Arc::new(client));

    match cli.command {
        Commands::Send {
            message,
            chat,
            file,
            web_search,
            max_tokens,
            model,
        } => {
            let mut request =
                SendMessage::new(message, max_tokens.unwrap_or(config.max_output_tokens));
            request.chat_id = chat;
            request.file = file;
            request.web_search = web_search;
            request.model = model.or(config.model);
            send(&session, &mut events, request).await?;
        }
        Commands::History { chat, pages } => {
            history(&session, &chat, pages).await?;
        }
        Commands::WebSearch { chat } => {
            session.toggle_web_search(&chat).await?;
            println!("Toggled web search for chat {}", chat);
        }
        Commands::MaxTokens {
            chat,
            max_output_tokens,
        } => {
            session
                .change_max_output_tokens(&chat, max_output_tokens)
                .await?;
            println!(
                "Max output tokens for chat {} set to {}",
                chat, max_output_tokens
            );
        }
    }

    Ok(())
}
