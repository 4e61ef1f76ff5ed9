use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::types::CommandState;

pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Single deadline for the command awaiting a reply.
#[derive(Debug)]
pub struct TimeoutSupervisor {
    period: Duration,
    armed: Option<(Instant, CommandState)>,
}

impl Default for TimeoutSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutSupervisor {
    pub fn new() -> Self {
        Self::with_period(COMMAND_TIMEOUT)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            armed: None,
        }
    }

    /// Restart the deadline for `command`. Idle is an unbounded long-poll,
    /// so arming for it only clears the timer.
    pub fn arm(&mut self, command: CommandState) {
        if command == CommandState::Idle {
            self.disarm();
            return;
        }
        log::trace!("Command timer started for {}", command.label());
        self.armed = Some((Instant::now() + self.period, command));
    }

    pub fn disarm(&mut self) {
        if let Some((_, command)) = self.armed.take() {
            log::trace!("Command timer stopped for {}", command.label());
        }
    }

    pub fn armed_for(&self) -> Option<CommandState> {
        self.armed.map(|(_, command)| command)
    }

    /// Completes with the supervised command once the deadline passes;
    /// pending forever while disarmed.
    pub async fn expired(&self) -> CommandState {
        match self.armed {
            Some((deadline, command)) => {
                sleep_until(deadline).await;
                command
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_thirty_seconds_with_command() {
        let mut timer = TimeoutSupervisor::new();
        timer.arm(CommandState::RequestStatus);

        let started = Instant::now();
        let command = timer.expired().await;
        assert_eq!(command, CommandState::RequestStatus);
        assert!(started.elapsed() >= COMMAND_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_the_deadline() {
        let mut timer = TimeoutSupervisor::new();
        timer.arm(CommandState::Connect);
        tokio::time::advance(Duration::from_secs(20)).await;
        timer.arm(CommandState::Authenticate);

        let started = Instant::now();
        assert_eq!(timer.expired().await, CommandState::Authenticate);
        assert!(started.elapsed() >= COMMAND_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let mut timer = TimeoutSupervisor::new();
        timer.arm(CommandState::Play);
        timer.disarm();
        assert_eq!(timer.armed_for(), None);

        let fired = tokio::time::timeout(Duration::from_secs(3600), timer.expired()).await;
        assert!(fired.is_err());
    }

    #[test]
    fn idle_is_never_armed() {
        let mut timer = TimeoutSupervisor::new();
        timer.arm(CommandState::RequestStatus);
        timer.arm(CommandState::Idle);
        assert_eq!(timer.armed_for(), None);
    }
}
