use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;

use lockplay::display::ChannelSink;
use lockplay::toggle::SharedToggle;
use lockplay::types::{ConnectionState, PlaybackState, StatusReport, ToggleState};
use lockplay::{Config, Engine, Handle};

const GREETING: &str = "OK MPD 0.23.5\n";

/// One accepted client connection, seen from the server side.
struct Session {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Session {
    async fn accept(listener: &TcpListener) -> Session {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, writer) = stream.into_split();
        Session {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn expect(&mut self, line: &str) {
        let got = self.lines.next_line().await.unwrap();
        assert_eq!(got.as_deref(), Some(line));
    }

    async fn send(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
    }
}

struct Harness {
    listener: TcpListener,
    handle: Handle,
    toggle: SharedToggle,
    reports: mpsc::UnboundedReceiver<StatusReport>,
    engine: tokio::task::JoinHandle<()>,
}

fn config(service: impl ToString, password: Option<&str>) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        service: service.to_string(),
        password: password.map(str::to_string),
        ..Config::default()
    }
}

fn spawn(
    config: &Config,
) -> (
    Handle,
    SharedToggle,
    mpsc::UnboundedReceiver<StatusReport>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, reports) = mpsc::unbounded_channel();
    let toggle = SharedToggle::new(ToggleState::Disengaged);
    let (engine, handle) = Engine::new(
        config,
        Box::new(ChannelSink::new(tx)),
        Box::new(toggle.clone()),
    );
    (handle, toggle, reports, tokio::spawn(engine.run()))
}

async fn start(password: Option<&str>) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handle, toggle, reports, engine) = spawn(&config(port, password));

    Harness {
        listener,
        handle,
        toggle,
        reports,
        engine,
    }
}

async fn wait_for<F>(reports: &mut mpsc::UnboundedReceiver<StatusReport>, mut f: F) -> StatusReport
where
    F: FnMut(&StatusReport) -> bool,
{
    loop {
        let report = reports.recv().await.expect("engine stopped publishing");
        if f(&report) {
            return report;
        }
    }
}

#[tokio::test]
async fn follows_playback_and_plays_when_indicator_engages() {
    let mut h = start(None).await;
    let mut server = Session::accept(&h.listener).await;

    server.send(GREETING).await;
    server.expect("status").await;
    server.send("volume: 40\nstate: pause\nOK\n").await;
    server.expect("idle player").await;

    let report = wait_for(&mut h.reports, |r| r.playback == PlaybackState::Paused).await;
    assert_eq!(report.connection, ConnectionState::Connected);
    assert_eq!(report.to_string(), "Paused");

    h.toggle.store(ToggleState::Engaged);
    h.handle.toggle_changed();
    server.expect("noidle").await;
    server.send("OK\n").await;
    server.expect("play -1").await;
    server.send("OK\n").await;
    server.expect("status").await;
    server.send("state: play\nOK\n").await;
    server.expect("idle player").await;

    wait_for(&mut h.reports, |r| r.playback == PlaybackState::Playing).await;

    h.handle.shutdown();
    server.expect("close").await;
    assert_eq!(server.lines.next_line().await.unwrap(), None);

    h.engine.await.unwrap();
    let last = wait_for(&mut h.reports, |r| r.connection == ConnectionState::Disconnected).await;
    assert_eq!(last.message, "");
}

#[tokio::test]
async fn player_change_while_idle_refreshes_status() {
    let mut h = start(None).await;
    let mut server = Session::accept(&h.listener).await;

    server.send(GREETING).await;
    server.expect("status").await;
    server.send("state: stop\nOK\n").await;
    server.expect("idle player").await;

    server.send("changed: player\nOK\n").await;
    server.expect("status").await;
    server.send("state: play\nOK\n").await;
    server.expect("idle player").await;

    let report = wait_for(&mut h.reports, |r| r.playback == PlaybackState::Playing).await;
    assert_eq!(report.to_string(), "Playing");
    // The indicator is driven to follow playback.
    assert_eq!(lockplay::toggle::ToggleProvider::read(&h.toggle), ToggleState::Engaged);

    h.handle.shutdown();
    h.engine.await.unwrap();
}

#[tokio::test]
async fn rejected_password_surfaces_server_text() {
    let mut h = start(Some("wrong")).await;
    let mut server = Session::accept(&h.listener).await;

    server.send(GREETING).await;
    server.expect("password wrong").await;
    server.send("ACK [3@0] {password} incorrect password\n").await;
    server.expect("close").await;

    let report = wait_for(&mut h.reports, |r| {
        r.connection == ConnectionState::Disconnected && !r.message.is_empty()
    })
    .await;
    assert!(report.message.starts_with("Authentication failed"));
    assert!(report.message.contains("incorrect password"));

    h.handle.shutdown();
    h.engine.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unanswered_status_times_out_and_reconnects() {
    let began = Instant::now();
    let mut h = start(None).await;
    let mut server = Session::accept(&h.listener).await;

    server.send(GREETING).await;
    server.expect("status").await;

    let report = wait_for(&mut h.reports, |r| {
        r.connection == ConnectionState::Disconnected && !r.message.is_empty()
    })
    .await;
    assert_eq!(report.message, "Timeout waiting for response to status command");
    assert_eq!(
        report.to_string(),
        "Not Connected: Timeout waiting for response to status command"
    );
    assert!(began.elapsed() >= Duration::from_secs(30));
    server.expect("close").await;

    // 30s for the status reply, then the 5s reconnect delay.
    let mut retried = Session::accept(&h.listener).await;
    assert!(began.elapsed() >= Duration::from_secs(35));

    retried.send(GREETING).await;
    retried.expect("status").await;

    h.handle.shutdown();
    h.engine.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn refused_connection_retries_after_delay() {
    let began = Instant::now();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (handle, _toggle, mut reports, engine) = spawn(&config(port, None));
    let report = wait_for(&mut reports, |r| {
        r.connection == ConnectionState::Disconnected && !r.message.is_empty()
    })
    .await;
    assert!(
        report
            .message
            .starts_with(&format!("Error connecting to 127.0.0.1:{}", port)),
        "{}",
        report.message
    );

    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let mut server = Session::accept(&listener).await;
    assert!(began.elapsed() >= Duration::from_secs(5));

    server.send(GREETING).await;
    server.expect("status").await;

    handle.shutdown();
    engine.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_lookup_is_reported_and_retried() {
    let began = Instant::now();
    let (handle, _toggle, mut reports, engine) = spawn(&config("not-a-port", None));

    let report = wait_for(&mut reports, |r| !r.message.is_empty()).await;
    assert_eq!(report.connection, ConnectionState::Disconnected);
    assert_eq!(
        report.message,
        "Unable to resolve node \"127.0.0.1\" service \"not-a-port\" (unknown service)"
    );

    let again = wait_for(&mut reports, |r| !r.message.is_empty()).await;
    assert_eq!(again, report);
    assert!(began.elapsed() >= Duration::from_secs(5));

    handle.shutdown();
    engine.await.unwrap();
}

#[tokio::test]
async fn shutdown_is_handled_before_first_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handle, _toggle, mut reports, engine) = spawn(&config(port, None));

    handle.shutdown();
    engine.await.unwrap();
    let last = wait_for(&mut reports, |r| r.connection == ConnectionState::Disconnected).await;
    assert_eq!(last.to_string(), "Not Connected");
}

#[tokio::test]
async fn dropping_every_handle_stops_the_engine() {
    let h = start(None).await;
    let Harness {
        listener,
        handle,
        engine,
        ..
    } = h;
    let _server = Session::accept(&listener).await;

    drop(handle);
    engine.await.unwrap();
}
