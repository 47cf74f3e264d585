//! Interactive field collection.
//!
//! A [`PromptSession`] sends a prompt and waits for one syntactically valid
//! integer, re-prompting the same field on malformed input. Dates are three
//! such fields collected in order; whether they form a real calendar date is
//! left to the caller.

use crate::channel::{Incoming, MessageChannel};
use crate::datemath;
use crate::error::SessionError;
use chrono::NaiveDate;
use std::fmt;
use tracing::debug;

/// A field the client is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Year,
    Month,
    Day,
}

impl Field {
    /// Fields of a date, in collection order
    pub const DATE: [Field; 3] = [Field::Year, Field::Month, Field::Day];

    pub fn prompt(self) -> String {
        format!("Input the {self}")
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Year => "year",
            Field::Month => "month",
            Field::Day => "day",
        })
    }
}

/// Unvalidated (year, month, day) triple as typed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientDate {
    pub year: i32,
    pub month: i32,
    pub day: i32,
}

impl ClientDate {
    pub fn is_valid(&self) -> bool {
        datemath::is_valid_date(self.year, self.month, self.day)
    }

    /// The calendar date, if the triple forms one.
    pub fn to_date(&self) -> Option<NaiveDate> {
        datemath::calendar_date(self.year, self.month, self.day)
    }
}

/// Result of parsing one field reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    Complete(i32),
    Malformed,
}

/// Parse a field reply as a signed 32-bit integer.
///
/// The text is taken as-is: no trimming, and command words such as
/// `quit` are just malformed numbers here.
pub fn parse_field(text: &str) -> ParseResult {
    match text.parse::<i32>() {
        Ok(value) => ParseResult::Complete(value),
        Err(_) => ParseResult::Malformed,
    }
}

/// Prompt/validate/retry loop over one connection's channel.
pub struct PromptSession<'a, C> {
    channel: &'a mut C,
}

impl<'a, C: MessageChannel> PromptSession<'a, C> {
    pub fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }

    /// Prompt for `field` until the client replies with an integer.
    ///
    /// Non-text frames do not count as replies. Transport failures and
    /// channel closure abort the collection.
    pub async fn collect_integer(&mut self, field: Field) -> Result<i32, SessionError> {
        self.channel.send(&field.prompt()).await?;

        loop {
            let text = match self.channel.recv().await? {
                Incoming::Text(text) => text,
                Incoming::Other => continue,
            };

            match parse_field(&text) {
                ParseResult::Complete(value) => return Ok(value),
                ParseResult::Malformed => {
                    debug!(%field, "Malformed field reply");
                    let retry = format!("You must send a valid number\n{}", field.prompt());
                    self.channel.send(&retry).await?;
                }
            }
        }
    }

    /// Collect year, month and day, in that order.
    pub async fn collect_date(&mut self) -> Result<ClientDate, SessionError> {
        let mut values = [0i32; 3];
        for (slot, field) in values.iter_mut().zip(Field::DATE) {
            *slot = self.collect_integer(field).await?;
        }
        let [year, month, day] = values;
        Ok(ClientDate { year, month, day })
    }
}
