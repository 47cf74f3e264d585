//! Interactive console client for the calendar server.
//!
//! Forwards each line typed on stdin as a text message and prints every
//! text message the server sends. Typing `quit` ends the session locally.

use clap::Parser;
use futures_util::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the calendar client
#[derive(Parser, Debug)]
#[command(name = "calendar-client")]
#[command(version)]
#[command(about = "Console client for the calendar server", long_about = None)]
struct ClientArgs {
    /// WebSocket URL of the server
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/calendar")]
    url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!(url = %args.url, "Connecting");
    let (ws, _) = connect_async(args.url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    let output = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => println!("{text}"),
                Ok(_) => continue,
                Err(e) => {
                    println!("Error while receiving: {e}");
                    break;
                }
            }
        }
    });

    let ending = forward_lines(BufReader::new(tokio::io::stdin()), &mut sink).await?;
    debug!(?ending, "Input finished");

    output.abort();
    let _ = output.await;
    if let Err(e) = sink.close().await {
        debug!(error = %e, "Close failed");
    }

    println!("Connection closed. Goodbye!");
    Ok(())
}

/// Why the input loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Quit,
    EndOfInput,
    SendFailed,
}

/// Send each input line as a text message until a `quit` line (any case),
/// end of input or a send failure. The `quit` line itself is not sent.
async fn forward_lines<R, S>(input: R, sink: &mut S) -> std::io::Result<Ending>
where
    R: AsyncBufRead + Unpin,
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.eq_ignore_ascii_case("quit") {
            return Ok(Ending::Quit);
        }
        if let Err(e) = sink.send(Message::Text(line)).await {
            println!("Error while sending: {e}");
            return Ok(Ending::SendFailed);
        }
    }
    Ok(Ending::EndOfInput)
}
