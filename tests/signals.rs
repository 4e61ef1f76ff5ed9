use std::time::Duration;

use nix::sys::signal::{raise, Signal};
use tokio::time::timeout;

use lockplay::signals;
use lockplay::toggle::{SharedToggle, ToggleProvider};
use lockplay::types::{Intent, ToggleState};
use lockplay::{Control, Handle};

#[tokio::test]
async fn hangup_and_user_signals_become_controls() {
    let (handle, mut rx) = Handle::channel();
    let shared = SharedToggle::new(ToggleState::Disengaged);
    let _listener = signals::listen(handle, Some(shared.clone())).unwrap();

    raise(Signal::SIGHUP).unwrap();
    let control = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(control, Some(Control::Request(Intent::RequestStatus)));

    raise(Signal::SIGUSR1).unwrap();
    let control = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(control, Some(Control::ToggleChanged));
    assert_eq!(shared.read(), ToggleState::Engaged);
}
