mod bible;
mod broadcast;
mod conf;
mod control;
mod display;
mod logging;
mod protocol;
mod relay;
mod server;
mod slides;
mod transport;

use crate::bible::BibleClient;
use crate::conf::operations::SettingsPanel;
use crate::conf::{SETTING_KEYS, SettingsStore};
use crate::logging::{LogConfig, init_logging};
use crate::protocol::{ClientMessage, OperatorAction, RemoteInput, ServerMessage};
use crate::server::{ServeOptions, SocketServer};
use crate::transport::{AsyncTransport, DEFAULT_SOCKET_PATH};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "sermon-flow")]
#[command(about = "Two-screen presentation controller for slides and Bible verses")]
#[command(version = "0.1.0")]
struct Cli {
    /// Service socket path
    #[arg(long, global = true, default_value = DEFAULT_SOCKET_PATH)]
    socket_path: String,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the presentation service
    Serve {
        /// Folder of slide images (defaults to the data dir's assets/slides)
        #[arg(long)]
        slides_dir: Option<PathBuf>,

        /// Folder of verse background images (defaults to the data dir's assets/backgrounds)
        #[arg(long)]
        backgrounds_dir: Option<PathBuf>,
    },

    /// Follow the projector output
    Projector {
        /// Also keep an HTML rendering of the current frame in this file
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// List the loaded slides
    Slides,
    /// Re-read the slides folder
    Reload,
    /// Select a slide by number without projecting it
    Select {
        #[arg(allow_negative_numbers = true)]
        number: i64,
    },
    /// Search the current version
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Select a search result by number
    Pick { number: usize },
    /// Project the current selection
    Project,
    /// Show the next slide
    Next,
    /// Show the previous slide
    Prev,
    /// Black out the projector
    Black,
    /// Clear the projector
    Clear,
    /// Toggle the remote lock
    Lock,
    /// Close the projector display (the next display command reopens it)
    CloseProjector,
    /// Check service status
    Status,

    /// Send one remote token (NEXT, SET_VER_KJV, ...) or clicker key name (PageDown, F1, ...)
    Remote { token: String },

    /// Forward remote tokens or key names read line by line from stdin
    Listen,

    /// View and edit persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show current settings
    Show,
    /// Set a value (apiBibleKey, defaultVersion, overlayReturnMs, showVerseNumbers, bibleIds.<VERSION>)
    Set { key: String, value: String },
    /// Store an API.Bible key and check what it can see
    TestKey { key: String },
    /// List the Bibles the stored key can see
    Bibles,
}

fn get_uid() -> String {
    std::env::var("UID").unwrap_or_else(|_| {
        // Fallback: use nix to get actual UID
        nix::unistd::getuid().to_string()
    })
}

fn expand_socket_path(path: &str) -> String {
    let expanded = path.replace("$UID", &get_uid());

    // Support $RUNTIME_DIRECTORY for systemd RuntimeDirectory=
    if let Ok(runtime_dir) = std::env::var("RUNTIME_DIRECTORY") {
        expanded.replace("$RUNTIME_DIRECTORY", &runtime_dir)
    } else {
        expanded
    }
}

/// Token to send for a remote argument: tokens pass through, key names are mapped
fn remote_token(raw: &str) -> String {
    RemoteInput::parse(raw)
        .or_else(|| RemoteInput::from_key(raw))
        .map(|input| input.token().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Slide numbers on the command line start at 1
fn select_action(number: i64) -> OperatorAction {
    OperatorAction::Select {
        index: number.saturating_sub(1),
    }
}

fn mask_key(key: &str) -> String {
    match key.char_indices().nth(4) {
        _ if key.is_empty() => "(not set)".to_string(),
        Some((cut, _)) => format!("{}…", &key[..cut]),
        None => "****".to_string(),
    }
}

fn print_response(response: ServerMessage) -> Result<()> {
    match response {
        ServerMessage::Ack { preview, .. } => {
            println!("{}", preview.title);
            println!("  {}", preview.text);
        }
        ServerMessage::Slides {
            folder_missing,
            slides,
            preview,
            ..
        } => {
            if folder_missing || slides.is_empty() {
                println!("{}", preview.title);
                println!("  {}", preview.text);
            }
            for slide in slides {
                let marker = if slide.active { ">" } else { " " };
                println!("{} {:>3}. {}", marker, slide.number, slide.file);
            }
        }
        ServerMessage::Results { items, .. } => {
            for (i, item) in items.iter().enumerate() {
                println!("{:>2}. {}", i + 1, item.title);
                println!("    {}", item.snippet);
            }
        }
        ServerMessage::Accepted { input, .. } => match input {
            Some(input) => println!("Sent {}", input.token()),
            None => println!("Ignored: not a remote token"),
        },
        ServerMessage::Status {
            status,
            uptime_seconds,
            started_at,
            ..
        } => {
            let json = serde_json::json!({
                "service_running": true,
                "started_at": started_at,
                "uptime_seconds": uptime_seconds,
                "control": status,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        ServerMessage::Error { error, .. } => bail!("Error from service: {}", error),
        ServerMessage::Subscribed { .. } | ServerMessage::Frame { .. } => {
            bail!("Unexpected response type")
        }
    }
    Ok(())
}

async fn request(transport: &AsyncTransport, message: ClientMessage) -> Result<()> {
    let response = transport.send_request(&message).await?;
    print_response(response)
}

async fn operator(transport: &AsyncTransport, action: OperatorAction) -> Result<()> {
    request(transport, ClientMessage::new_operator(action)).await
}

async fn follow_projector(transport: &AsyncTransport, html: Option<PathBuf>) -> Result<()> {
    let mut conn = transport.connect().await?;
    conn.write_message(&ClientMessage::new_subscribe()).await?;

    while let Some(message) = conn.read_server_message().await? {
        match message {
            ServerMessage::Subscribed { .. } => {
                eprintln!("Following projector at {}", transport.socket_path())
            }
            ServerMessage::Frame { frame, ts } => {
                println!("[{:>8}ms] {}", ts, frame.describe());
                if let Some(path) = &html {
                    tokio::fs::write(path, frame.to_html_document())
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
            }
            ServerMessage::Error { error, .. } => bail!("Error from service: {}", error),
            other => tracing::debug!(?other, "ignoring message"),
        }
    }

    eprintln!("Service closed the connection");
    Ok(())
}

async fn listen(transport: &AsyncTransport) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message = ClientMessage::new_remote(remote_token(&line));
        if let Err(e) = request(transport, message).await {
            eprintln!("{:#}", e);
        }
    }
    Ok(())
}

async fn settings(action: SettingsAction) -> Result<()> {
    let store = SettingsStore::new()?;
    let client = BibleClient::new();

    match action {
        SettingsAction::Show => {
            let current = store.load();
            println!("Settings file: {}", store.path().display());
            for key in SETTING_KEYS {
                let value = current.get_value(key)?;
                let value = if key == "apiBibleKey" { mask_key(&value) } else { value };
                println!("  {:<18} {}", key, value);
            }
        }
        SettingsAction::Set { key, value } => {
            let mut panel = SettingsPanel::open(store)?;
            panel.set(&key, &value)?;
            println!("{}", panel.save()?);
        }
        SettingsAction::TestKey { key } => {
            let mut panel = SettingsPanel::open(store)?;
            println!("{}", panel.test_key(&client, &key).await);
        }
        SettingsAction::Bibles => {
            let panel = SettingsPanel::open(store)?;
            let bibles = panel.load_bibles(&client).await?;
            for bible in bibles {
                match bible.abbreviation {
                    Some(abbreviation) => {
                        println!("{}  {} ({})", bible.id, bible.name, abbreviation)
                    }
                    None => println!("{}  {}", bible.id, bible.name),
                }
            }
        }
    }
    Ok(())
}

async fn serve(
    socket_path: &str,
    slides_dir: Option<PathBuf>,
    backgrounds_dir: Option<PathBuf>,
) -> Result<()> {
    let assets = conf::assets_dir();
    let default_dir = |name: &str| {
        assets
            .as_ref()
            .map(|dir| dir.join(name))
            .ok_or_else(|| anyhow!("Could not determine data directory; pass --{}-dir", name))
    };

    let options = ServeOptions {
        slides_dir: slides_dir.map(Ok).unwrap_or_else(|| default_dir("slides"))?,
        backgrounds_dir: backgrounds_dir
            .map(Ok)
            .unwrap_or_else(|| default_dir("backgrounds"))?,
        store: SettingsStore::new()?,
        bible: BibleClient::new(),
    };

    tracing::info!(socket = socket_path, "starting sermon-flow service");
    tracing::info!(slides = %options.slides_dir.display(), backgrounds = %options.backgrounds_dir.display(), "asset folders");

    let mut server = SocketServer::new(socket_path, options)
        .context("Failed to create socket server")?;
    server.run().await.context("Socket server error")?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let socket_path = expand_socket_path(&cli.socket_path);
    let transport = AsyncTransport::new(socket_path.clone());

    match cli.command {
        Commands::Serve {
            slides_dir,
            backgrounds_dir,
        } => serve(&socket_path, slides_dir, backgrounds_dir).await,
        Commands::Projector { html } => follow_projector(&transport, html).await,
        Commands::Slides => operator(&transport, OperatorAction::Slides).await,
        Commands::Reload => operator(&transport, OperatorAction::ReloadSlides).await,
        Commands::Select { number } => {
            operator(&transport, select_action(number)).await
        }
        Commands::Search { query } => {
            let query = query.join(" ");
            operator(&transport, OperatorAction::Search { query }).await
        }
        Commands::Pick { number } => {
            let index = number
                .checked_sub(1)
                .ok_or_else(|| anyhow!("Result numbers start at 1"))?;
            operator(&transport, OperatorAction::Pick { index }).await
        }
        Commands::Project => operator(&transport, OperatorAction::Project).await,
        Commands::Next => operator(&transport, OperatorAction::Next).await,
        Commands::Prev => operator(&transport, OperatorAction::Prev).await,
        Commands::Black => operator(&transport, OperatorAction::Black).await,
        Commands::Clear => operator(&transport, OperatorAction::Clear).await,
        Commands::Lock => operator(&transport, OperatorAction::Lock).await,
        Commands::CloseProjector => operator(&transport, OperatorAction::CloseProjector).await,
        Commands::Status => request(&transport, ClientMessage::new_status()).await,
        Commands::Remote { token } => {
            request(&transport, ClientMessage::new_remote(remote_token(&token))).await
        }
        Commands::Listen => listen(&transport).await,
        Commands::Settings { action } => settings(action).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The service logs its progress; client commands stay quiet unless asked
    let verbosity = match cli.command {
        Commands::Serve { .. } => cli.verbose.saturating_add(1),
        _ => cli.verbose,
    };
    init_logging(&LogConfig::from_verbosity(verbosity).with_timestamps(verbosity > 0));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
