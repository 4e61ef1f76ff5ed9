//! The MPD command pipeline, free of any I/O.
//!
//! [`Protocol`] consumes reply lines, run-requests and indicator changes and
//! answers with an [`Outcome`]: at most one request to put on the wire, what to
//! do with the command timer, and whether the status changed. The engine
//! carries the outcome out. Since every outcome sends at most one request and
//! requests are only issued from the transition table below, a second command
//! can never be written while one is awaiting its reply.

use std::fmt;

use crate::error::{Error, Result};
use crate::types::{CommandState, Intent, PlaybackState, ToggleState};

/// A request the client sends to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum Request {
    Password(String),
    Status,
    Idle,
    NoIdle,
    Play,
    Pause,
}

impl Request {
    /// The request as it goes on the wire, terminator included.
    pub fn line(&self) -> String {
        match self {
            Request::Password(password) => format!("password {}\n", password),
            Request::Status => "status\n".to_string(),
            Request::Idle => "idle player\n".to_string(),
            Request::NoIdle => "noidle\n".to_string(),
            Request::Play => "play -1\n".to_string(),
            Request::Pause => "pause 1\n".to_string(),
        }
    }

    /// The command state entered once the request is sent.
    pub fn awaits(&self) -> CommandState {
        match self {
            Request::Password(_) => CommandState::Authenticate,
            Request::Status => CommandState::RequestStatus,
            Request::Idle => CommandState::Idle,
            Request::NoIdle => CommandState::LeavingIdle,
            Request::Play => CommandState::Play,
            Request::Pause => CommandState::Pause,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Request::Password(_) => "password",
            Request::Status => "status request",
            Request::Idle => "idle request",
            Request::NoIdle => "idle abort",
            Request::Play => "play command",
            Request::Pause => "pause command",
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Password(_) => f.write_str("password ********"),
            other => f.write_str(other.line().trim_end()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Keep,
    Stop,
    Start(CommandState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub send: Option<Request>,
    pub timer: Timer,
    /// The status report changed and should be republished.
    pub publish: bool,
    /// Drive the external indicator to this state.
    pub indicator: Option<ToggleState>,
}

impl Default for Outcome {
    fn default() -> Self {
        Self {
            send: None,
            timer: Timer::Keep,
            publish: false,
            indicator: None,
        }
    }
}

enum Reply<'a> {
    Ok,
    Ack,
    Data { key: &'a str },
    Blank,
}

fn classify(line: &str) -> Reply<'_> {
    match line.split_whitespace().next() {
        Some("OK") => Reply::Ok,
        Some("ACK") => Reply::Ack,
        Some(key) => Reply::Data { key },
        None => Reply::Blank,
    }
}

#[derive(Debug)]
pub struct Protocol {
    password: Option<String>,
    replace_in_flight: bool,
    command: CommandState,
    pending: Option<Intent>,
    playback: PlaybackState,
    toggle: ToggleState,
}

impl Protocol {
    pub fn new(password: Option<String>, replace_in_flight: bool, toggle: ToggleState) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
            replace_in_flight,
            command: CommandState::None,
            pending: None,
            playback: PlaybackState::Unknown,
            toggle,
        }
    }

    pub fn command(&self) -> CommandState {
        self.command
    }

    pub fn pending(&self) -> Option<Intent> {
        self.pending
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn toggle(&self) -> ToggleState {
        self.toggle
    }

    /// A socket connected; the server greeting is next.
    pub fn on_connected(&mut self) {
        self.command = CommandState::Connect;
        self.pending = None;
        self.playback = PlaybackState::Unknown;
    }

    pub fn on_disconnected(&mut self) {
        self.command = CommandState::None;
        self.pending = None;
    }

    /// Record what the indicator actually did after being driven.
    pub fn observe_toggle(&mut self, actual: ToggleState) {
        self.toggle = actual;
    }

    pub fn on_line(&mut self, line: &str) -> Result<Outcome> {
        match classify(line) {
            Reply::Ok => self.on_ok(),
            Reply::Ack => Err(self.on_ack(line)),
            Reply::Data { key } => self.on_data(key, line),
            Reply::Blank => Ok(Outcome::default()),
        }
    }

    fn on_ok(&mut self) -> Result<Outcome> {
        let next = match self.command {
            CommandState::None => {
                return Err(Error::ProtocolViolation(
                    "got OK response but no command was running",
                ))
            }
            CommandState::Connect => match &self.password {
                Some(password) => {
                    log::debug!("Connected, sending password");
                    Request::Password(password.clone())
                }
                None => {
                    log::debug!("Connected, requesting status");
                    Request::Status
                }
            },
            CommandState::Authenticate => {
                log::debug!("Authenticated, requesting status");
                Request::Status
            }
            // A pending intent stays queued until the idle reply comes back.
            CommandState::RequestStatus => Request::Idle,
            CommandState::Idle | CommandState::LeavingIdle => match self.pending.take() {
                None => Request::Idle,
                Some(Intent::RequestStatus) => Request::Status,
                Some(Intent::Play) => Request::Play,
                Some(Intent::Pause) => Request::Pause,
            },
            CommandState::Play | CommandState::Pause => Request::Status,
        };

        Ok(self.issue(next))
    }

    fn on_ack(&mut self, line: &str) -> Error {
        let context = match self.command {
            CommandState::None => {
                return Error::ProtocolViolation("got ACK response but no command was running")
            }
            CommandState::Connect => "Session start failed",
            CommandState::Authenticate => "Authentication failed",
            CommandState::RequestStatus => "Status request failed",
            CommandState::Idle => "Idle command failed",
            CommandState::LeavingIdle => "Idle abort failed",
            CommandState::Play => "Play command failed",
            CommandState::Pause => "Pause command failed",
        };
        Error::ServerRejected {
            context,
            reply: line.to_string(),
        }
    }

    fn on_data(&mut self, key: &str, line: &str) -> Result<Outcome> {
        match self.command {
            CommandState::None => Err(Error::ProtocolViolation(
                "got data but no command was running",
            )),
            CommandState::Connect
            | CommandState::Authenticate
            | CommandState::LeavingIdle
            | CommandState::Play
            | CommandState::Pause => {
                log::trace!("Ignoring {} reply line: {}", self.command.label(), line);
                Ok(Outcome::default())
            }
            CommandState::Idle => {
                if line == "changed: player" {
                    if self.pending.is_none() {
                        log::debug!("Player changed, queuing status request");
                        self.pending = Some(Intent::RequestStatus);
                    } else {
                        log::debug!("Player changed, {:?} already queued", self.pending);
                    }
                }
                Ok(Outcome::default())
            }
            CommandState::RequestStatus if key == "state:" => {
                let value = line.trim_start().trim_start_matches("state:");
                self.playback = PlaybackState::from_status(value);
                log::debug!("Playback state is now {:?}", self.playback);
                Ok(Outcome {
                    publish: true,
                    indicator: self.indicator_for(self.playback),
                    ..Outcome::default()
                })
            }
            CommandState::RequestStatus => Ok(Outcome::default()),
        }
    }

    /// The indicator follows playback: lit while playing, dark otherwise.
    fn indicator_for(&self, playback: PlaybackState) -> Option<ToggleState> {
        match (playback, self.toggle) {
            (PlaybackState::Playing, ToggleState::Disengaged) => Some(ToggleState::Engaged),
            (PlaybackState::Paused | PlaybackState::Stopped, ToggleState::Engaged) => {
                Some(ToggleState::Disengaged)
            }
            _ => None,
        }
    }

    /// Ask for `intent` to be carried out as soon as the pipeline allows.
    ///
    /// The caller is responsible for only asking while connected.
    pub fn request(&mut self, intent: Intent) -> Outcome {
        if self.playback == PlaybackState::Unknown {
            log::debug!("Ignoring {:?}: playback state not known yet", intent);
            return Outcome::default();
        }

        match self.command {
            CommandState::None | CommandState::Connect | CommandState::Authenticate => {
                log::debug!("Ignoring {:?}: connection not ready for commands", intent);
                Outcome::default()
            }
            CommandState::Idle => {
                let outcome = self.issue(Request::NoIdle);
                self.queue(intent);
                outcome
            }
            CommandState::RequestStatus => {
                self.pending = Some(intent);
                Outcome::default()
            }
            CommandState::LeavingIdle | CommandState::Play | CommandState::Pause => {
                if self.replace_in_flight {
                    self.pending = Some(intent);
                } else {
                    log::debug!(
                        "Dropping {:?}: {} already running",
                        intent,
                        self.command.label()
                    );
                }
                Outcome::default()
            }
        }
    }

    /// React to the indicator having possibly changed to `current`.
    pub fn evaluate_toggle(&mut self, current: ToggleState) -> Outcome {
        if self.command == CommandState::None || self.playback == PlaybackState::Unknown {
            return Outcome::default();
        }

        let previous = std::mem::replace(&mut self.toggle, current);
        match (previous, current) {
            (ToggleState::Disengaged, ToggleState::Engaged)
                if self.playback != PlaybackState::Playing =>
            {
                self.request(Intent::Play)
            }
            (ToggleState::Engaged, ToggleState::Disengaged)
                if self.playback == PlaybackState::Playing =>
            {
                self.request(Intent::Pause)
            }
            _ => Outcome::default(),
        }
    }

    /// Queue behind a `noidle`. Last write wins, except that a status
    /// refresh never displaces a play or pause carried into idle.
    fn queue(&mut self, intent: Intent) {
        if intent == Intent::RequestStatus
            && matches!(self.pending, Some(Intent::Play | Intent::Pause))
        {
            return;
        }
        self.pending = Some(intent);
    }

    fn issue(&mut self, request: Request) -> Outcome {
        self.command = request.awaits();
        let timer = match self.command {
            CommandState::Idle => Timer::Stop,
            command => Timer::Start(command),
        };
        Outcome {
            send: Some(request),
            timer,
            ..Outcome::default()
        }
    }
}
