// Hardware capabilities consumed by the drive: one direction+PWM output pair
// per motor and the driver chip's shared standby line.
//
// The simulated backend keeps its state behind a shared handle so the loop
// can run without a Pi and tests can observe writes or inject faults.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Rotation direction as wired on the driver's IN1/IN2 pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("Write to {output} failed: {reason}")]
    WriteFailed { output: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ActuatorError>;

/// One motor output of the driver chip
///
/// Writes are synchronous and non-blocking; an error means a hardware fault.
pub trait HardwareActuator {
    /// Drive in `direction` with PWM duty `duty` in [0, 1]
    fn set(&mut self, direction: Direction, duty: f32) -> Result<()>;

    /// Release the output (both direction pins low, PWM zero)
    fn disable(&mut self) -> Result<()>;
}

/// The driver chip's standby/enable line
pub trait EnableLine {
    fn assert(&mut self) -> Result<()>;
    fn deassert(&mut self) -> Result<()>;
}

/// Last state written to a simulated motor output
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimOutput {
    /// `None` while the output is released
    pub direction: Option<Direction>,
    pub duty: f32,
    pub writes: u64,
    /// Fail every write from now on
    pub fail: bool,
}

/// Simulated motor output, cloneable so tests keep an observer handle
#[derive(Debug, Clone)]
pub struct SimActuator {
    name: &'static str,
    state: Arc<Mutex<SimOutput>>,
}

impl SimActuator {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(SimOutput::default())),
        }
    }

    pub fn output(&self) -> SimOutput {
        *lock(&self.state)
    }

    /// Make every following write fail, emulating a hardware fault
    pub fn inject_fault(&self) {
        lock(&self.state).fail = true;
    }

    fn write(&mut self, direction: Option<Direction>, duty: f32) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(ActuatorError::WriteFailed {
                output: self.name.to_string(),
                reason: "simulated fault".to_string(),
            });
        }
        debug!("sim {}: {:?} duty={:.3}", self.name, direction, duty);
        state.direction = direction;
        state.duty = duty;
        state.writes += 1;
        Ok(())
    }
}

impl HardwareActuator for SimActuator {
    fn set(&mut self, direction: Direction, duty: f32) -> Result<()> {
        self.write(Some(direction), duty)
    }

    fn disable(&mut self) -> Result<()> {
        self.write(None, 0.0)
    }
}

/// Simulated standby line
#[derive(Debug, Clone, Default)]
pub struct SimEnableLine {
    asserted: Arc<Mutex<bool>>,
}

impl SimEnableLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_asserted(&self) -> bool {
        *lock(&self.asserted)
    }
}

impl EnableLine for SimEnableLine {
    fn assert(&mut self) -> Result<()> {
        debug!("sim STBY high");
        *lock(&self.asserted) = true;
        Ok(())
    }

    fn deassert(&mut self) -> Result<()> {
        debug!("sim STBY low");
        *lock(&self.asserted) = false;
        Ok(())
    }
}

// A panicked observer must not wedge the actuation path
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
