//! POSIX signals as engine controls.
//!
//! SIGUSR1 / SIGUSR2 report the indicator engaged / disengaged, SIGHUP asks
//! for a status refresh and SIGTERM shuts down. SIGINT is left to `ctrlc`.

use std::io;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::engine::Handle;
use crate::toggle::SharedToggle;
use crate::types::{Intent, ToggleState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Engaged,
    Disengaged,
    Refresh,
    Terminate,
}

/// Turn one received signal into a control for the engine.
///
/// `shared` is the in-memory indicator, if that is the one in use; an LED
/// indicator is read back by the engine instead.
pub fn dispatch(received: Signal, handle: &Handle, shared: Option<&SharedToggle>) {
    match received {
        Signal::Terminate => {
            log::info!("Received terminate signal, closing connection...");
            handle.shutdown();
        }
        Signal::Refresh => {
            log::debug!("Received hangup, refreshing status");
            handle.request(Intent::RequestStatus);
        }
        Signal::Engaged | Signal::Disengaged => {
            let state = if received == Signal::Engaged {
                ToggleState::Engaged
            } else {
                ToggleState::Disengaged
            };
            log::debug!("Indicator signal: {:?}", state);
            if let Some(shared) = shared {
                shared.store(state);
            }
            handle.toggle_changed();
        }
    }
}

/// Install the handlers and forward signals until the runtime stops.
pub fn listen(handle: Handle, shared: Option<SharedToggle>) -> io::Result<JoinHandle<()>> {
    let mut engaged = signal(SignalKind::user_defined1())?;
    let mut disengaged = signal(SignalKind::user_defined2())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = engaged.recv() => Signal::Engaged,
                Some(()) = disengaged.recv() => Signal::Disengaged,
                Some(()) = hangup.recv() => Signal::Refresh,
                Some(()) = terminate.recv() => Signal::Terminate,
                else => break,
            };
            dispatch(received, &handle, shared.as_ref());
        }
    }))
}
