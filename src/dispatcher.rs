//! Per-connection command loop.
//!
//! Sends the usage banner, then reads one command at a time and runs the
//! matching flow until the client quits or the channel goes away:
//!
//! ```text
//! check  -> year              -> "Is year <y> leap? <bool>"
//! calc   -> date, date        -> "Interval between dates is <interval>"
//! day    -> date              -> "<WEEKDAY>"
//! quit   -> (nothing further)
//! ```
//!
//! Every completed flow re-shows the command prompt behind a separator.

use crate::channel::{Incoming, MessageChannel};
use crate::datemath::{day_name, day_of_week, interval_between, is_leap_year};
use crate::error::SessionError;
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::session::{Field, PromptSession};
use std::sync::Arc;
use tracing::debug;

pub const USAGE: &str = "Usage:\n\
    Use one of commands:\n\
    \"check\" to check is year leap\n\
    \"calc\" to calc interval length\n\
    \"day\" to get the name of day of week\n\
    \"quit\" to exit";

pub const COMMAND_PROMPT: &str = "Input the command:";

/// Shown after every completed command.
pub const NEXT_COMMAND_PROMPT: &str = "----\nInput the command:";

pub const UNKNOWN_COMMAND: &str =
    "Unknown command. Choose one of the following to proceed:\ncheck | calc | day | quit";

/// A command token sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Check,
    Calc,
    Day,
    Quit,
    Unknown,
}

impl Command {
    /// Map a message to a command, ignoring ASCII case.
    pub fn parse(text: &str) -> Self {
        const COMMANDS: [(&str, Command); 4] = [
            ("check", Command::Check),
            ("calc", Command::Calc),
            ("day", Command::Day),
            ("quit", Command::Quit),
        ];
        COMMANDS
            .iter()
            .find(|(name, _)| text.eq_ignore_ascii_case(name))
            .map(|&(_, command)| command)
            .unwrap_or(Command::Unknown)
    }
}

/// Serve one connection until quit, closure or failure.
///
/// The connection is registered for the duration of the call and removed
/// on every exit path. `Ok(())` means the client quit.
pub async fn run<C: MessageChannel>(
    mut channel: C,
    connection: Connection,
    registry: Arc<ConnectionRegistry>,
) -> Result<(), SessionError> {
    let guard = registry.register(connection);
    let result = command_loop(&mut channel, guard.id()).await;
    channel.close().await;
    result
}

async fn command_loop<C: MessageChannel>(
    channel: &mut C,
    id: ConnectionId,
) -> Result<(), SessionError> {
    channel.send(USAGE).await?;
    channel.send(COMMAND_PROMPT).await?;

    loop {
        let text = match channel.recv().await? {
            Incoming::Text(text) => text,
            Incoming::Other => continue,
        };

        let command = Command::parse(&text);
        debug!(conn = %id, ?command, "Dispatching command");

        match command {
            Command::Check => check(channel).await?,
            Command::Calc => calc(channel).await?,
            Command::Day => day(channel).await?,
            Command::Quit => return Ok(()),
            Command::Unknown => channel.send(UNKNOWN_COMMAND).await?,
        }
    }
}

async fn check<C: MessageChannel>(channel: &mut C) -> Result<(), SessionError> {
    let year = PromptSession::new(&mut *channel)
        .collect_integer(Field::Year)
        .await?;

    channel
        .send(&format!("Is year {year} leap? {}", is_leap_year(year)))
        .await?;
    channel.send(NEXT_COMMAND_PROMPT).await
}

async fn calc<C: MessageChannel>(channel: &mut C) -> Result<(), SessionError> {
    let mut session = PromptSession::new(&mut *channel);
    let first = session.collect_date().await?;
    let second = session.collect_date().await?;

    let reply = match (first.to_date(), second.to_date()) {
        (Some(a), Some(b)) => format!("Interval between dates is {}", interval_between(a, b)),
        _ => "Incorrect date, can't find interval".to_string(),
    };

    channel.send(&reply).await?;
    channel.send(NEXT_COMMAND_PROMPT).await
}

async fn day<C: MessageChannel>(channel: &mut C) -> Result<(), SessionError> {
    let date = PromptSession::new(&mut *channel).collect_date().await?;

    let reply = match date.to_date() {
        Some(date) => day_name(day_of_week(date)).to_string(),
        None => "Incorrect date, can't find day of week".to_string(),
    };

    channel.send(&reply).await?;
    channel.send(NEXT_COMMAND_PROMPT).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory::{drain, memory_channel, scripted};
    use std::net::SocketAddr;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("check"), Command::Check);
        assert_eq!(Command::parse("CALC"), Command::Calc);
        assert_eq!(Command::parse("Day"), Command::Day);
        assert_eq!(Command::parse("qUiT"), Command::Quit);
        assert_eq!(Command::parse("checks"), Command::Unknown);
        assert_eq!(Command::parse(" check"), Command::Unknown);
        assert_eq!(Command::parse(""), Command::Unknown);
    }

    #[tokio::test]
    async fn test_check_retries_then_reports() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) = scripted(&["check", "abc", "2000"]);

        let result = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        assert!(matches!(result, Err(SessionError::Closed)));
        assert_eq!(
            drain(&mut sent),
            vec![
                USAGE,
                COMMAND_PROMPT,
                "Input the year",
                "You must send a valid number\nInput the year",
                "Is year 2000 leap? true",
                NEXT_COMMAND_PROMPT,
            ]
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_calc_reports_interval() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) =
            scripted(&["calc", "2020", "1", "1", "2021", "3", "15"]);

        let _ = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        let sent = drain(&mut sent);
        let tail = &sent[sent.len() - 2..];
        assert_eq!(
            tail,
            [
                "Interval between dates is 1 year(s) 2 month(s) 14 day(s)",
                NEXT_COMMAND_PROMPT,
            ]
        );
        let prompts: Vec<_> = sent.iter().filter(|m| m.starts_with("Input the ")).collect();
        assert_eq!(prompts.len(), 7);
    }

    #[tokio::test]
    async fn test_calc_is_order_independent() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) =
            scripted(&["calc", "2021", "3", "15", "2020", "1", "1"]);

        let _ = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        assert!(drain(&mut sent)
            .contains(&"Interval between dates is 1 year(s) 2 month(s) 14 day(s)".to_string()));
    }

    #[tokio::test]
    async fn test_calc_with_invalid_date() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) =
            scripted(&["calc", "2023", "2", "29", "2024", "1", "1", "check", "2023"]);

        let _ = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        let sent = drain(&mut sent);
        assert!(sent.contains(&"Incorrect date, can't find interval".to_string()));
        // Flow completed normally; the next command was served.
        assert!(sent.contains(&"Is year 2023 leap? false".to_string()));
    }

    #[tokio::test]
    async fn test_calc_with_invalid_second_date() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) =
            scripted(&["calc", "2020", "1", "1", "2021", "4", "31"]);

        let _ = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        let sent = drain(&mut sent);
        // One combined failure, no per-field error for the bad day.
        assert_eq!(
            &sent[sent.len() - 2..],
            ["Incorrect date, can't find interval", NEXT_COMMAND_PROMPT]
        );
        assert!(!sent.iter().any(|m| m.starts_with("You must send")));
        assert!(!sent.iter().any(|m| m.starts_with("Interval between")));
    }

    #[tokio::test]
    async fn test_day_of_week() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) = scripted(&["DAY", "2024", "1", "1", "day", "2024", "13", "1"]);

        let _ = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        let sent = drain(&mut sent);
        assert!(sent.contains(&"MONDAY".to_string()));
        assert!(sent.contains(&"Incorrect date, can't find day of week".to_string()));
        assert_eq!(
            sent.iter().filter(|m| *m == NEXT_COMMAND_PROMPT).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) = scripted(&["hello"]);

        let _ = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        assert_eq!(
            drain(&mut sent),
            vec![USAGE, COMMAND_PROMPT, UNKNOWN_COMMAND]
        );
    }

    #[tokio::test]
    async fn test_quit_stops_and_deregisters() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) = scripted(&["quit", "check"]);

        let result = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        assert!(result.is_ok());
        assert_eq!(drain(&mut sent), vec![USAGE, COMMAND_PROMPT]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_quit_as_field_value_is_not_a_command() {
        let registry = ConnectionRegistry::new();
        let (channel, mut sent) = scripted(&["check", "quit", "2024"]);

        let _ = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        let sent = drain(&mut sent);
        assert!(sent.contains(&"You must send a valid number\nInput the year".to_string()));
        assert!(sent.contains(&"Is year 2024 leap? true".to_string()));
    }

    #[tokio::test]
    async fn test_connection_registered_while_active() {
        let registry = ConnectionRegistry::new();
        let connection = registry.connection(peer());
        let id = connection.id;
        let (channel, mut peer) = memory_channel();

        let task = tokio::spawn(run(channel, connection, Arc::clone(&registry)));

        assert_eq!(peer.outgoing.recv().await.as_deref(), Some(USAGE));
        assert!(registry.contains(id));
        assert_eq!(registry.snapshot().len(), 1);

        peer.send_other();
        peer.send_text("quit");
        assert!(task.await.unwrap().is_ok());
        assert!(!registry.contains(id));
        assert_eq!(peer.drain(), vec![COMMAND_PROMPT]);
    }

    #[tokio::test]
    async fn test_send_failure_deregisters() {
        let registry = ConnectionRegistry::new();
        let (channel, client) = memory_channel();
        // Client goes away before the banner is sent.
        drop(client);

        let result = run(channel, registry.connection(peer()), Arc::clone(&registry)).await;

        assert!(matches!(result, Err(SessionError::Closed)));
        assert!(registry.is_empty());
    }
}
