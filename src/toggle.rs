use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::ToggleState;

/// The external on/off indicator that play/pause follows.
pub trait ToggleProvider {
    fn read(&self) -> ToggleState;

    /// Best effort: returns the state the indicator is in afterwards, which
    /// may still be the old one.
    fn set(&mut self, desired: ToggleState) -> ToggleState;
}

impl<T: ToggleProvider + ?Sized> ToggleProvider for Box<T> {
    fn read(&self) -> ToggleState {
        (**self).read()
    }

    fn set(&mut self, desired: ToggleState) -> ToggleState {
        (**self).set(desired)
    }
}

/// An indicator held in memory, shared between the engine and whatever flips
/// it (a signal handler, a hotkey daemon, a test).
#[derive(Debug, Clone, Default)]
pub struct SharedToggle {
    state: Arc<Mutex<ToggleState>>,
}

impl SharedToggle {
    pub fn new(initial: ToggleState) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn store(&self, state: ToggleState) {
        *self.state.lock() = state;
    }
}

impl ToggleProvider for SharedToggle {
    fn read(&self) -> ToggleState {
        *self.state.lock()
    }

    fn set(&mut self, desired: ToggleState) -> ToggleState {
        let mut state = self.state.lock();
        if desired != ToggleState::Unknown {
            *state = desired;
        }
        *state
    }
}

/// A keyboard LED exposed through the Linux LED class, for example
/// `/sys/class/leds/input3::scrolllock`.
#[derive(Debug, Clone)]
pub struct LedToggle {
    brightness: PathBuf,
}

impl LedToggle {
    /// `path` may name the LED directory or its `brightness` file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let brightness = if path.is_dir() {
            path.join("brightness")
        } else {
            path.to_path_buf()
        };
        Self { brightness }
    }

    pub fn path(&self) -> &Path {
        &self.brightness
    }
}

impl ToggleProvider for LedToggle {
    fn read(&self) -> ToggleState {
        match fs::read_to_string(&self.brightness) {
            Ok(contents) => match contents.trim().parse::<u32>() {
                Ok(0) => ToggleState::Disengaged,
                Ok(_) => ToggleState::Engaged,
                Err(e) => {
                    log::debug!("Unreadable LED brightness {:?}: {}", contents.trim(), e);
                    ToggleState::Unknown
                }
            },
            Err(e) => {
                log::debug!("Unable to read {}: {}", self.brightness.display(), e);
                ToggleState::Unknown
            }
        }
    }

    fn set(&mut self, desired: ToggleState) -> ToggleState {
        let current = self.read();
        if desired == current || desired == ToggleState::Unknown {
            return current;
        }
        let value = if desired == ToggleState::Engaged { "1" } else { "0" };

        if let Err(e) = fs::write(&self.brightness, value) {
            log::warn!(
                "Unable to set LED {} to {}: {}",
                self.brightness.display(),
                value,
                e
            );
        }
        self.read()
    }
}
