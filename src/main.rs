//! CLI for RelayChat
//!
//! Subcommands:
//! - `server` (default): run the relay
//! - `send`: send one message to a running relay and print what comes back

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use relaychat::config::load_config;
use relaychat::transport::ClientEvent;
use relaychat::utils::error::AppError;
use relaychat::utils::logging;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::error;

#[derive(Parser)]
#[command(name = "relaychat", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the relay server
    Server,
    /// Send one chat message and print the first relayed message
    Send {
        /// WebSocket URL of a running relay
        #[arg(long, default_value = "ws://127.0.0.1:3000")]
        url: String,
        /// Seconds to wait for the relayed message
        #[arg(long, default_value_t = 5)]
        wait: u64,
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_config().map_err(AppError::from) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log.level);

    let result = match cli.command.unwrap_or(Command::Server) {
        Command::Server => relaychat::app::run(settings)
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Command::Send { url, wait, text } => run_send(&url, &text, wait).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_send(url: &str, text: &str, wait: u64) -> Result<(), Box<dyn std::error::Error>> {
    let (mut ws_stream, _response) = connect_async(url).await?;

    let event = serde_json::to_string(&ClientEvent::Message(text.to_string()))?;
    ws_stream.send(WsMessage::Text(event.into())).await?;

    match tokio::time::timeout(Duration::from_secs(wait), ws_stream.next()).await {
        Ok(Some(Ok(WsMessage::Text(relayed)))) => println!("{}", relayed.as_str()),
        Ok(Some(Ok(other))) => println!("{other}"),
        Ok(Some(Err(e))) => return Err(e.into()),
        Ok(None) => return Err("connection closed before a message arrived".into()),
        Err(_) => return Err(format!("nothing relayed within {wait}s").into()),
    }

    ws_stream.close(None).await?;
    Ok(())
}
