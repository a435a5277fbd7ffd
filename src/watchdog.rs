// Deadman watchdog
// If no command is accepted within the timeout (teleop crashed, link dropped,
// autonomous loop stalled), the drive is forced into safe stop.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::motor::{DriveController, EnableLine, HardwareActuator, actuator};

pub struct DeadmanWatchdog {
    last_command_at: Option<Instant>,
    timeout: Duration,
    tripped: bool,
}

impl DeadmanWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_command_at: None,
            timeout,
            tripped: false,
        }
    }

    /// Stamp an accepted command; clears a previous trip
    pub fn notify_command(&mut self, now: Instant) {
        if self.tripped {
            info!("Command accepted, deadman cleared");
        }
        self.tripped = false;
        self.last_command_at = Some(now);
    }

    /// No command has been accepted within the timeout (or ever)
    pub fn is_stale(&self, now: Instant) -> bool {
        match self.last_command_at {
            Some(at) => now.saturating_duration_since(at) > self.timeout,
            None => true,
        }
    }

    /// Run the staleness check for this tick, forcing safe stop when stale
    ///
    /// Returns true if the deadman is tripped after the check.
    pub fn check<A, E>(
        &mut self,
        now: Instant,
        drive: &mut DriveController<A, E>,
    ) -> actuator::Result<bool>
    where
        A: HardwareActuator,
        E: EnableLine,
    {
        if !self.is_stale(now) {
            return Ok(false);
        }
        if let Some(age) = self.command_age(now) {
            if !self.tripped {
                warn!(
                    "Command stale ({:?} old, timeout {:?}), stopping motors",
                    age, self.timeout
                );
            }
            self.tripped = true;
        }
        drive.safe_stop()?;
        Ok(self.tripped)
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn command_age(&self, now: Instant) -> Option<Duration> {
        self.last_command_at
            .map(|at| now.saturating_duration_since(at))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
