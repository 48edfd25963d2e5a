use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::cookie::Jar;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatbox::{
    ChatWidget, Config, CookieTokenProvider, HttpTransport, InputBuffer, Sender, StaticToken,
    TokenProvider, Transcript,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "chatbox", version)]
#[command(about = "Chat with a CSRF-protected JSON chat endpoint from the terminal")]
struct Cli {
    /// Server base URL (overrides the config file)
    #[arg(long, env = "CHATBOX_SERVER_URL")]
    server_url: Option<String>,

    /// Use this CSRF token instead of reading it from the cookie jar
    #[arg(long, env = "CHATBOX_CSRF_TOKEN")]
    csrf_token: Option<String>,

    /// Skip the GET that lets the server set its cookies
    #[arg(long)]
    no_bootstrap: bool,

    /// Alternate config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Send {
        /// Message text
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match cli.command {
        // The TUI owns the terminal, so logs go to a file.
        None => Some(Config::log_path()?),
        Some(_) => None,
    };
    init_logging(log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("Using default config: {}", e);
            Config::default()
        }),
    };
    if let Some(url) = cli.server_url {
        config.server_url = url;
    }
    if cli.no_bootstrap {
        config.bootstrap_path = None;
    }

    let jar = Arc::new(Jar::default());
    let transport = HttpTransport::new(&config, jar.clone())?;
    tracing::info!("Chat endpoint: {}{}", transport.base_url(), config.endpoint.trim_start_matches('/'));

    let tokens: Arc<dyn TokenProvider> = match cli.csrf_token {
        Some(token) => Arc::new(StaticToken(Some(token))),
        None => {
            transport.bootstrap().await;
            Arc::new(CookieTokenProvider::new(
                jar,
                transport.base_url().clone(),
                &config.csrf_cookie,
            ))
        }
    };

    let server_label = transport.base_url().to_string();
    let transport = Arc::new(transport);
    let transcript = Arc::new(Transcript::new());

    match cli.command {
        Some(Commands::Send { message }) => {
            let input = Arc::new(InputBuffer::with_text(&message));
            let widget = ChatWidget::new(input, transcript.clone(), transport, tokens);
            send_once(&widget, &transcript).await
        }
        None => {
            let input = Arc::new(InputBuffer::new());
            let widget = ChatWidget::new(input.clone(), transcript.clone(), transport, tokens);
            let app = App::new(widget, transcript, input, server_label);
            run_tui(app).await
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "chatbox=info".into());

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// One-shot exchange: submit, wait for it, print whatever the bot said.
async fn send_once(widget: &ChatWidget, transcript: &Transcript) -> Result<()> {
    let Some(handle) = widget.submit() else {
        tracing::warn!("Nothing to send: message is empty");
        return Ok(());
    };
    handle.await.context("Exchange task panicked")?;

    for msg in transcript.snapshot().iter().filter(|m| m.sender == Sender::Bot) {
        println!("{}", msg.text);
    }
    Ok(())
}

async fn run_tui(mut app: App) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result: Result<()> = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok(())
    }
    .await;

    tui::restore()?;
    terminal.show_cursor()?;
    result
}
