use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Everything that can end a connection cycle.
///
/// The `Display` text of each variant is what the display sink shows as the
/// status message, so it is written for people rather than for logs.
/// None of these are fatal to the process: the engine disconnects, publishes
/// the message and schedules a reconnect.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to resolve node \"{host}\" service \"{service}\" ({reason})")]
    Resolution {
        host: String,
        service: String,
        reason: String,
    },

    #[error("Unable to {action} ({source})")]
    ConnectSetup {
        action: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Error connecting to {addr} ({source})")]
    ConnectRefused {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Lost connection to {addr} ({reason})")]
    ConnectionLost { addr: SocketAddr, reason: String },

    #[error("Error sending {what} ({source})")]
    Send {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Internal error, {0}")]
    ProtocolViolation(&'static str),

    #[error("{context} ({reply})")]
    ServerRejected { context: &'static str, reply: String },

    #[error("Timeout waiting for response to {command}")]
    Timeout { command: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_command() {
        let err = Error::Timeout {
            command: "status command",
        };
        assert_eq!(
            err.to_string(),
            "Timeout waiting for response to status command"
        );
    }

    #[test]
    fn server_rejection_keeps_raw_reply() {
        let err = Error::ServerRejected {
            context: "Authentication failed",
            reply: "ACK [3@0] {password} incorrect password".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication failed (ACK [3@0] {password} incorrect password)"
        );
    }
}
