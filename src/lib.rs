//! Keeps an MPD server's play/pause state in step with an on/off indicator
//! such as a keyboard LED.
//!
//! The [`engine::Engine`] holds a single connection to the server, follows
//! playback through `idle player`, and turns indicator changes into `play`
//! and `pause` commands. Status changes go to a [`display::DisplaySink`].

pub mod config;
pub mod connection;
pub mod display;
pub mod engine;
pub mod error;
pub mod framer;
pub mod protocol;
pub mod resolver;
pub mod retry;
pub mod signals;
pub mod timeout;
pub mod toggle;
pub mod types;

pub use config::Config;
pub use engine::{Control, Engine, Handle};
pub use error::{Error, Result};
