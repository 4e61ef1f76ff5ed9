//! The session actor.
//!
//! One [`Engine`] owns the resolver, socket, framer, timers and protocol state
//! and handles one event to completion before waiting for the next. Other
//! tasks and signal handlers talk to it through a [`Handle`].

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::connection::{ConnectionManager, Readiness};
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::framer::LineFramer;
use crate::protocol::{Outcome, Protocol, Timer};
use crate::resolver::Resolver;
use crate::retry::RetryController;
use crate::timeout::TimeoutSupervisor;
use crate::toggle::ToggleProvider;
use crate::types::{CommandState, ConnectionState, Intent, StatusReport};

const READ_BUFFER_SIZE: usize = 4096;

type Lookup = Pin<Box<dyn Future<Output = Result<Vec<SocketAddr>>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Request(Intent),
    ToggleChanged,
    Shutdown,
}

/// Cloneable sender side of the engine. Safe to use from any thread,
/// including a signal handler.
#[derive(Debug, Clone)]
pub struct Handle {
    tx: mpsc::UnboundedSender<Control>,
}

impl Handle {
    /// A handle and the receiver its controls arrive on.
    pub fn channel() -> (Handle, mpsc::UnboundedReceiver<Control>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Handle { tx }, rx)
    }

    pub fn request(&self, intent: Intent) {
        self.send(Control::Request(intent));
    }

    /// The indicator may have changed; the engine reads it back itself.
    pub fn toggle_changed(&self) {
        self.send(Control::ToggleChanged);
    }

    pub fn shutdown(&self) {
        self.send(Control::Shutdown);
    }

    fn send(&self, control: Control) {
        if self.tx.send(control).is_err() {
            log::debug!("Engine already stopped, dropping {:?}", control);
        }
    }
}

enum Event {
    Control(Control),
    Resolved(Result<Vec<SocketAddr>>),
    Connection(Readiness),
    Timeout(CommandState),
    Retry,
}

pub struct Engine {
    resolver: Resolver,
    lookup: Option<Lookup>,
    connection: ConnectionManager,
    framer: LineFramer,
    timeout: TimeoutSupervisor,
    retry: RetryController,
    protocol: Protocol,
    display: Box<dyn DisplaySink + Send>,
    toggle: Box<dyn ToggleProvider + Send>,
    control: mpsc::UnboundedReceiver<Control>,
    message: String,
    running: bool,
}

impl Engine {
    pub fn new(
        config: &Config,
        display: Box<dyn DisplaySink + Send>,
        toggle: Box<dyn ToggleProvider + Send>,
    ) -> (Self, Handle) {
        let (handle, control) = Handle::channel();
        let protocol = Protocol::new(
            config.password.clone(),
            config.replace_in_flight,
            toggle.read(),
        );

        let engine = Self {
            resolver: Resolver::new(config.host.clone(), config.service.clone()),
            lookup: None,
            connection: ConnectionManager::new(),
            framer: LineFramer::new(),
            timeout: TimeoutSupervisor::new(),
            retry: RetryController::new(config.retry_backoff),
            protocol,
            display,
            toggle,
            control,
            message: String::new(),
            running: true,
        };
        (engine, handle)
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            connection: self.connection.state(),
            playback: self.protocol.playback(),
            message: self.message.clone(),
        }
    }

    /// Run the session until [`Handle::shutdown`] is called or every handle
    /// is dropped.
    pub async fn run(mut self) {
        self.publish();
        self.connect();

        while self.running {
            let event = self.next_event().await;
            self.handle(event);
        }

        log::info!("Shutting down");
        self.retry.cancel();
        self.disconnect();
        self.message.clear();
        self.publish();
    }

    async fn next_event(&mut self) -> Event {
        tokio::select! {
            biased;

            control = self.control.recv() => {
                Event::Control(control.unwrap_or(Control::Shutdown))
            }
            result = resolved(&mut self.lookup) => Event::Resolved(result),
            readiness = self.connection.ready() => Event::Connection(readiness),
            command = self.timeout.expired() => Event::Timeout(command),
            () = self.retry.due() => Event::Retry,
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Control(Control::Shutdown) => self.running = false,
            Event::Control(Control::Request(intent)) => self.request(intent),
            Event::Control(Control::ToggleChanged) => self.evaluate_toggle(),
            Event::Resolved(result) => {
                self.lookup = None;
                match result {
                    Ok(addrs) => {
                        self.resolver.install(addrs);
                        self.connect();
                    }
                    Err(err) => self.fail(err),
                }
            }
            Event::Connection(Readiness::Connected) => self.on_connected(),
            Event::Connection(Readiness::ConnectFailed(err)) => {
                self.resolver.advance();
                self.fail(err);
            }
            Event::Connection(Readiness::Readable) => self.on_readable(),
            Event::Connection(Readiness::Lost(err)) => self.fail(err),
            Event::Timeout(command) => self.fail(Error::Timeout {
                command: command.label(),
            }),
            Event::Retry => {
                self.retry.clear();
                self.connect();
            }
        }
    }

    /// Start a connection attempt to the next candidate, or start a lookup
    /// when there is none left. The lookup result arrives as an event.
    fn connect(&mut self) {
        if self.connection.state() != ConnectionState::Disconnected || self.lookup.is_some() {
            return;
        }

        let Some(addr) = self.resolver.current() else {
            log::debug!("Looking up server address");
            self.lookup = Some(Box::pin(self.resolver.lookup()));
            return;
        };

        match self.connection.connect(addr) {
            Ok(()) => {
                log::info!("Connecting to {}", addr);
                self.message = addr.to_string();
                self.publish();
            }
            Err(err) => {
                self.resolver.advance();
                self.fail(err);
            }
        }
    }

    fn on_connected(&mut self) {
        if let Some(addr) = self.connection.peer() {
            log::info!("Connected to {}", addr);
        }
        self.resolver.reset();
        self.retry.reset();
        self.framer.clear();
        self.protocol.on_connected();
        self.timeout.arm(CommandState::Connect);
        self.message.clear();
        self.publish();
    }

    fn on_readable(&mut self) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let n = match self.connection.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => n,
            Err(err) => return self.fail(err),
        };

        let lines: Vec<String> = self.framer.feed(&buf[..n]).collect();
        for line in lines {
            log::debug!("< {}", line);
            match self.protocol.on_line(&line) {
                Ok(outcome) => self.apply(outcome),
                Err(err) => return self.fail(err),
            }
            // A failed send inside apply() drops the connection.
            if self.connection.state() != ConnectionState::Connected {
                return;
            }
        }
    }

    fn request(&mut self, intent: Intent) {
        if self.connection.state() != ConnectionState::Connected {
            log::debug!("Ignoring {:?} while not connected", intent);
            return;
        }
        let outcome = self.protocol.request(intent);
        self.apply(outcome);
    }

    fn evaluate_toggle(&mut self) {
        if self.connection.state() != ConnectionState::Connected {
            return;
        }
        let current = self.toggle.read();
        let outcome = self.protocol.evaluate_toggle(current);
        self.apply(outcome);
    }

    fn apply(&mut self, outcome: Outcome) {
        if outcome.timer == Timer::Stop {
            self.timeout.disarm();
        }

        if let Some(request) = outcome.send {
            log::debug!("> {}", request);
            if let Err(source) = self.connection.send(request.line().as_bytes()) {
                return self.fail(Error::Send {
                    what: request.describe(),
                    source,
                });
            }
        }

        if let Timer::Start(command) = outcome.timer {
            self.timeout.arm(command);
        }

        if let Some(desired) = outcome.indicator {
            let actual = self.toggle.set(desired);
            if actual != desired {
                log::warn!("Indicator stayed {:?}, wanted {:?}", actual, desired);
            }
            self.protocol.observe_toggle(actual);
        }

        if outcome.publish {
            self.publish();
        }
    }

    /// Drop the connection, show why, and try again later.
    fn fail(&mut self, err: Error) {
        log::warn!("{}", err);
        self.disconnect();
        self.message = err.to_string();
        self.publish();

        if self.running {
            if let Some(delay) = self.retry.schedule() {
                log::info!("Reconnecting in {}s", delay.as_secs());
            }
        }
    }

    fn disconnect(&mut self) {
        self.lookup = None;
        self.connection.disconnect();
        self.timeout.disarm();
        self.protocol.on_disconnected();
    }

    fn publish(&mut self) {
        let report = self.status();
        self.display.publish(&report);
    }
}

async fn resolved(lookup: &mut Option<Lookup>) -> Result<Vec<SocketAddr>> {
    match lookup {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}
