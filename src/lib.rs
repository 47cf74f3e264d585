//! calendar-server: an interactive calendar service over WebSocket
//!
//! Each client connection walks through a small line-oriented command
//! protocol:
//! - `check`: is a year a leap year
//! - `calc`: the interval between two dates
//! - `day`: the day of the week of a date
//! - `quit`: end the session
//!
//! Connections are handled by one task each and tracked in a shared
//! registry for the duration of the session.

pub mod channel;
pub mod config;
pub mod datemath;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
