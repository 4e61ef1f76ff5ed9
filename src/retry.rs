use std::time::Duration;

use tokio::time::{sleep_until, Instant};

pub const RETRY_DELAY: Duration = Duration::from_secs(5);
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Schedules reconnect attempts after a failure.
///
/// Retries never give up. With backoff disabled every attempt waits
/// [`RETRY_DELAY`]; with it enabled the delay doubles per consecutive failure
/// up to [`MAX_RETRY_DELAY`] and drops back after a successful connection.
#[derive(Debug)]
pub struct RetryController {
    base: Duration,
    backoff: bool,
    next_delay: Duration,
    due: Option<Instant>,
    cancelled: bool,
}

impl RetryController {
    pub fn new(backoff: bool) -> Self {
        Self::with_delay(RETRY_DELAY, backoff)
    }

    pub fn with_delay(base: Duration, backoff: bool) -> Self {
        Self {
            base,
            backoff,
            next_delay: base,
            due: None,
            cancelled: false,
        }
    }

    /// Arm the reconnect timer, replacing any earlier schedule.
    ///
    /// Returns the delay, or `None` once cancelled.
    pub fn schedule(&mut self) -> Option<Duration> {
        if self.cancelled {
            return None;
        }

        let delay = self.next_delay;
        self.due = Some(Instant::now() + delay);
        if self.backoff {
            self.next_delay = (delay * 2).min(MAX_RETRY_DELAY.max(self.base));
        }
        Some(delay)
    }

    /// A connection succeeded.
    pub fn reset(&mut self) {
        self.next_delay = self.base;
        self.due = None;
    }

    /// The scheduled attempt is being made.
    pub fn clear(&mut self) {
        self.due = None;
    }

    /// Stop retrying for good.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.due = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.due.is_some()
    }

    pub async fn due(&self) {
        match self.due {
            Some(at) => sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}
