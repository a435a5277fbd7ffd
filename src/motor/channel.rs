// Slew-rate limited motor channel
//
// Every control tick moves the applied duty toward the target by at most
// `max_step` and writes the result to the hardware output.

use super::actuator::{Direction, HardwareActuator, Result};

pub struct MotorChannel<A> {
    actuator: A,
    current: f32,
    target: f32,
    max_step: f32,
}

impl<A: HardwareActuator> MotorChannel<A> {
    pub fn new(actuator: A, max_step: f32) -> Self {
        Self {
            actuator,
            current: 0.0,
            target: 0.0,
            max_step,
        }
    }

    /// Store a new target duty, clamped to [-1, 1]
    pub fn set_target(&mut self, duty: f32) {
        // NaN never reaches the hardware
        self.target = if duty.is_nan() {
            0.0
        } else {
            duty.clamp(-1.0, 1.0)
        };
    }

    /// Advance one step toward the target and write it out
    ///
    /// The added increment never exceeds `max_step`; the stored sum is subject
    /// only to f32 rounding.
    pub fn tick(&mut self) -> Result<()> {
        let error = self.target - self.current;
        if error.abs() <= self.max_step {
            self.current = self.target;
        } else {
            self.current += error.clamp(-self.max_step, self.max_step);
        }
        self.write()
    }

    /// Zero both duties without slewing and release the output
    pub fn halt(&mut self) -> Result<()> {
        self.current = 0.0;
        self.target = 0.0;
        self.actuator.disable()
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    fn write(&mut self) -> Result<()> {
        if self.current > 0.0 {
            self.actuator.set(Direction::Forward, self.current)
        } else if self.current < 0.0 {
            self.actuator.set(Direction::Reverse, -self.current)
        } else {
            self.actuator.disable()
        }
    }
}
