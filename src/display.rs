use std::fmt;
use std::io::Write;

use tokio::sync::mpsc;

use crate::types::{ConnectionState, PlaybackState, StatusReport};

/// Where status reports go after every visible transition.
///
/// Called from the engine task only.
pub trait DisplaySink {
    fn publish(&mut self, report: &StatusReport);
}

impl<T: DisplaySink + ?Sized> DisplaySink for Box<T> {
    fn publish(&mut self, report: &StatusReport) {
        (**self).publish(report)
    }
}

/// One-line summary, as a tray tooltip would show it.
impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, separator) = match (self.connection, self.playback) {
            (ConnectionState::Disconnected, _) => ("Not Connected", ": "),
            (ConnectionState::Connecting, _) => ("Connecting", " to "),
            (ConnectionState::Connected, PlaybackState::Unknown) => ("Connected", " to "),
            (ConnectionState::Connected, PlaybackState::Playing) => ("Playing", ": "),
            (ConnectionState::Connected, PlaybackState::Paused) => ("Paused", ": "),
            (ConnectionState::Connected, PlaybackState::Stopped) => ("Stopped", ": "),
        };

        if self.message.is_empty() {
            f.write_str(label)
        } else {
            write!(f, "{}{}{}", label, separator, self.message)
        }
    }
}

/// Logs the summary whenever it changes.
#[derive(Debug, Default)]
pub struct LogSink {
    last: Option<String>,
}

impl DisplaySink for LogSink {
    fn publish(&mut self, report: &StatusReport) {
        let summary = report.to_string();
        if self.last.as_deref() == Some(summary.as_str()) {
            return;
        }
        log::info!("{}", summary);
        self.last = Some(summary);
    }
}

/// Writes each report as one JSON object per line, for a status bar or
/// tray helper reading our stdout.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, report: &StatusReport) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> DisplaySink for JsonLinesSink<W> {
    fn publish(&mut self, report: &StatusReport) {
        if let Err(e) = self.write(report) {
            log::error!("Failed to write status report: {}", e);
        }
    }
}

/// Forwards reports to an async consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusReport>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<StatusReport>) -> Self {
        Self { tx }
    }
}

impl DisplaySink for ChannelSink {
    fn publish(&mut self, report: &StatusReport) {
        if self.tx.send(report.clone()).is_err() {
            log::debug!("Status receiver dropped");
        }
    }
}
