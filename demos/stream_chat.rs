//! Streams one chat answer to stdout.
//!
//! ```text
//! cargo run --example stream_chat -- "payments errors today" --tz UTC
//! RUST_LOG=chatwire=debug cargo run --example stream_chat -- "auth failures"
//! ```

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use tracing::{info, warn};

use chatwire::{ChatEvent, Client, ClientConfig, StreamEvent, StreamQuery};

#[derive(Parser, Debug)]
#[command(name = "stream_chat", about = "Stream a chat answer from the backend")]
struct Cli {
    /// Question to ask.
    text: String,

    /// IANA timezone forwarded to the backend.
    #[arg(long)]
    tz: Option<String>,

    #[arg(long)]
    date_from: Option<String>,

    #[arg(long)]
    date_to: Option<String>,

    /// Backend base URL; empty means same-origin via the proxy origin.
    #[arg(long, env = "CHATWIRE_BACKEND_BASE", default_value = "http://localhost:8080")]
    base: String,

    /// Reconnect delay in milliseconds; defaults to CHATWIRE_RECONNECT_MS or 3000.
    #[arg(long)]
    reconnect_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatwire=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig::from_env();
    config.base_url = cli.base;
    if let Some(ms) = cli.reconnect_ms {
        config = config.with_reconnect_delay(Duration::from_millis(ms));
    }
    let client = Client::new(config)?;

    let mut query = StreamQuery::new(cli.text);
    query.tz = cli.tz;
    query.date_from = cli.date_from;
    query.date_to = cli.date_to;

    let handle = client.stream_chat(query)?;
    let mut events = handle.events();
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Open => info!("connected"),
            StreamEvent::Error(error) => warn!(error = %error, "stream error"),
            StreamEvent::Close => break,
            StreamEvent::Message(message) => match ChatEvent::from_message(&message) {
                ChatEvent::Token(text) => {
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
                ChatEvent::FetchProgress(progress) => {
                    info!(endpoint = %progress.endpoint, status = %progress.status, "fetch");
                }
                ChatEvent::LlmStart(phase) => info!(phase = %phase, "model call"),
                event if event.is_terminal() => break,
                _ => {}
            },
        }
    }

    handle.cancel();
    writeln!(stdout)?;
    Ok(())
}
