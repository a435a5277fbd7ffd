// Message types exchanged between producers, the runtime and telemetry consumers

use serde::{Deserialize, Serialize};

/// Which producer currently owns the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Manual,
    Autonomous,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Manual => Mode::Autonomous,
            Mode::Autonomous => Mode::Manual,
        }
    }
}

/// Drive command from teleop or the autonomous loop
///
/// Values are nominally in [-1, 1]; anything outside is clamped at the
/// arbiter boundary and non-finite values are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriveCommand {
    /// Differential mix of forward throttle and turn (positive turns right)
    Arcade { forward: f32, turn: f32 },
    /// Raw per-side duty
    Tank { left: f32, right: f32 },
    /// Ramp both sides to zero, keep the driver enabled
    Stop,
}

/// Out-of-band requests that must not be superseded by drive traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    SelectMode { mode: Mode },
    SafeStop,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("{field} is not a finite number ({value})")]
    NonFinite { field: &'static str, value: f32 },
}

impl DriveCommand {
    /// Validate a producer's command: reject non-finite values, clamp the rest
    /// into [-1, 1]. Returns the sanitized command and whether clamping occurred.
    pub fn sanitize(self) -> Result<(Self, bool), CommandError> {
        fn check(field: &'static str, value: f32) -> Result<(f32, bool), CommandError> {
            if !value.is_finite() {
                return Err(CommandError::NonFinite { field, value });
            }
            let clamped = value.clamp(-1.0, 1.0);
            Ok((clamped, clamped != value))
        }

        match self {
            DriveCommand::Arcade { forward, turn } => {
                let (forward, a) = check("forward", forward)?;
                let (turn, b) = check("turn", turn)?;
                Ok((DriveCommand::Arcade { forward, turn }, a || b))
            }
            DriveCommand::Tank { left, right } => {
                let (left, a) = check("left", left)?;
                let (right, b) = check("right", right)?;
                Ok((DriveCommand::Tank { left, right }, a || b))
            }
            DriveCommand::Stop => Ok((DriveCommand::Stop, false)),
        }
    }
}

/// Read-only view of the actuation core for UIs and telemetry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub mode: Mode,
    /// A mode switch is waiting for the motors to come to rest
    pub switching: bool,
    pub deadman_tripped: bool,
    pub current_left_duty: f32,
    pub current_right_duty: f32,
    /// Milliseconds since the last accepted command, if any was ever accepted
    pub command_age_ms: Option<u64>,
}
