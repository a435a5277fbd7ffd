// Differential drive controller for a two-motor base
//
// Owns both motor channels and the standby line. Commands are shaped as
// mix -> trim -> cap, then handed to the channels, which slew toward them on
// every tick.

use tracing::{debug, error, info, warn};

use super::actuator::{EnableLine, HardwareActuator, Result};
use super::channel::MotorChannel;
use crate::config::DriveConfig;

/// Per-side duty pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideDuty {
    pub left: f32,
    pub right: f32,
}

/// Standard differential mix: positive `turn` speeds up the left side
pub fn arcade_mix(forward: f32, turn: f32) -> SideDuty {
    SideDuty {
        left: (forward + turn).clamp(-1.0, 1.0),
        right: (forward - turn).clamp(-1.0, 1.0),
    }
}

pub struct DriveController<A: HardwareActuator, E: EnableLine> {
    left: MotorChannel<A>,
    right: MotorChannel<A>,
    enable: E,
    enabled: bool,
    config: DriveConfig,
}

impl<A: HardwareActuator, E: EnableLine> DriveController<A, E> {
    /// Take ownership of the outputs and force them into the safe state
    pub fn new(left: A, right: A, enable: E, config: DriveConfig) -> Result<Self> {
        let mut drive = Self {
            left: MotorChannel::new(left, config.max_step_per_tick),
            right: MotorChannel::new(right, config.max_step_per_tick),
            enable,
            enabled: true, // unknown hardware state, force the full stop below
            config,
        };
        drive.safe_stop()?;
        info!(
            "Drive ready: max duty {:.2}, trim L{:.2}/R{:.2}, slew {:.2}/tick",
            config.max_duty, config.left_trim, config.right_trim, config.max_step_per_tick
        );
        Ok(drive)
    }

    /// Arcade command: mix, trim and cap, then set both channel targets
    pub fn drive(&mut self, forward: f32, turn: f32) -> Result<()> {
        self.drive_sides(arcade_mix(forward.clamp(-1.0, 1.0), turn.clamp(-1.0, 1.0)))
    }

    /// Raw per-side duty; trim and the duty cap still apply
    pub fn drive_tank(&mut self, left: f32, right: f32) -> Result<()> {
        self.drive_sides(SideDuty {
            left: left.clamp(-1.0, 1.0),
            right: right.clamp(-1.0, 1.0),
        })
    }

    fn drive_sides(&mut self, duty: SideDuty) -> Result<()> {
        self.ensure_enabled()?;
        let cap = self.config.max_duty;
        let left = (duty.left * self.config.left_trim).clamp(-cap, cap);
        let right = (duty.right * self.config.right_trim).clamp(-cap, cap);
        debug!("Drive targets: left={:.3}, right={:.3}", left, right);
        self.left.set_target(left);
        self.right.set_target(right);
        Ok(())
    }

    fn ensure_enabled(&mut self) -> Result<()> {
        if !self.enabled {
            self.enable.assert()?;
            self.enabled = true;
            info!("Motor driver enabled");
        }
        Ok(())
    }

    /// Ramp both sides to zero; the driver stays enabled
    pub fn stop(&mut self) {
        self.left.set_target(0.0);
        self.right.set_target(0.0);
    }

    /// Cut both outputs immediately and drop the standby line
    ///
    /// Idempotent: does nothing if already stopped. Every output is attempted
    /// even if an earlier write fails; the first error is returned.
    pub fn safe_stop(&mut self) -> Result<()> {
        if self.is_safe() {
            return Ok(());
        }
        let left = self.left.halt();
        let right = self.right.halt();
        let enable = self.enable.deassert();
        self.enabled = false;
        info!("Safe stop: outputs released, enable line low");
        left.and(right).and(enable)
    }

    /// Advance both channels by one control step
    ///
    /// A write failure triggers `safe_stop()` before the error is returned;
    /// the caller must treat it as fatal.
    pub fn tick(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let result = self.left.tick().and_then(|_| self.right.tick());
        if let Err(e) = result {
            error!("Actuator fault: {}", e);
            // Force the full stop path even though enabled is still set
            if let Err(stop_err) = self.safe_stop() {
                warn!("Safe stop after actuator fault also failed: {}", stop_err);
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Both channels are at zero applied duty
    pub fn is_at_rest(&self) -> bool {
        self.left.current() == 0.0 && self.right.current() == 0.0
    }

    fn is_safe(&self) -> bool {
        !self.enabled && self.is_at_rest() && self.targets() == SideDuty::default()
    }

    pub fn current(&self) -> SideDuty {
        SideDuty {
            left: self.left.current(),
            right: self.right.current(),
        }
    }

    pub fn targets(&self) -> SideDuty {
        SideDuty {
            left: self.left.target(),
            right: self.right.target(),
        }
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }
}

impl<A: HardwareActuator, E: EnableLine> Drop for DriveController<A, E> {
    fn drop(&mut self) {
        // Never leave the motors powered when the owner goes away
        if let Err(e) = self.safe_stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::actuator::{Direction, SimActuator, SimEnableLine};

    struct Rig {
        drive: DriveController<SimActuator, SimEnableLine>,
        left: SimActuator,
        right: SimActuator,
        stby: SimEnableLine,
    }

    fn unity() -> DriveConfig {
        DriveConfig {
            max_duty: 1.0,
            left_trim: 1.0,
            right_trim: 1.0,
            max_step_per_tick: 0.1,
        }
    }

    fn rig(config: DriveConfig) -> Rig {
        let left = SimActuator::new("left");
        let right = SimActuator::new("right");
        let stby = SimEnableLine::new();
        let drive =
            DriveController::new(left.clone(), right.clone(), stby.clone(), config).unwrap();
        Rig {
            drive,
            left,
            right,
            stby,
        }
    }

    #[test]
    fn test_starts_in_safe_state() {
        let r = rig(unity());
        assert!(!r.drive.is_enabled());
        assert!(!r.stby.is_asserted());
        assert_eq!(r.left.output().direction, None);
        assert_eq!(r.right.output().direction, None);
    }

    #[test]
    fn test_arcade_mix() {
        assert_eq!(arcade_mix(0.5, 0.25), SideDuty { left: 0.75, right: 0.25 });
        // Saturated side is clamped, the other keeps its value
        assert_eq!(arcade_mix(1.0, 0.5), SideDuty { left: 1.0, right: 0.5 });
        assert_eq!(arcade_mix(0.0, -0.5), SideDuty { left: -0.5, right: 0.5 });
    }

    #[test]
    fn test_drive_enables_and_ramps_to_full_in_ten_ticks() {
        let mut r = rig(unity());
        for tick in 1..=10 {
            r.drive.drive(1.0, 0.0).unwrap();
            r.drive.tick().unwrap();
            if tick < 10 {
                assert!(r.drive.current().left < 1.0);
                assert!(r.drive.current().right < 1.0);
            }
        }
        assert!(r.drive.is_enabled());
        assert!(r.stby.is_asserted());
        assert_eq!(r.drive.current(), SideDuty { left: 1.0, right: 1.0 });
        assert_eq!(r.left.output().direction, Some(Direction::Forward));
    }

    #[test]
    fn test_trim_then_cap() {
        let mut r = rig(DriveConfig {
            max_duty: 0.6,
            left_trim: 1.0,
            right_trim: 0.5,
            max_step_per_tick: 0.1,
        });
        r.drive.drive(1.0, 0.0).unwrap();
        let targets = r.drive.targets();
        assert!((targets.left - 0.6).abs() < 1e-6);
        assert!((targets.right - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tank_applies_trim() {
        let mut r = rig(DriveConfig {
            right_trim: 0.87,
            ..unity()
        });
        r.drive.drive_tank(-0.5, 1.0).unwrap();
        let targets = r.drive.targets();
        assert!((targets.left + 0.5).abs() < 1e-6);
        assert!((targets.right - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_stop_ramps_and_keeps_enabled() {
        let mut r = rig(unity());
        r.drive.drive(0.5, 0.0).unwrap();
        for _ in 0..5 {
            r.drive.tick().unwrap();
        }
        r.drive.stop();
        r.drive.tick().unwrap();
        assert!(r.drive.is_enabled());
        assert!((r.drive.current().left - 0.4).abs() < 1e-5);
        for _ in 0..5 {
            r.drive.tick().unwrap();
        }
        assert!(r.drive.is_at_rest());
        assert!(r.stby.is_asserted());
    }

    #[test]
    fn test_safe_stop_is_immediate_and_idempotent() {
        let mut r = rig(unity());
        r.drive.drive(0.8, 0.2).unwrap();
        for _ in 0..6 {
            r.drive.tick().unwrap();
        }
        r.drive.safe_stop().unwrap();
        assert!(!r.drive.is_enabled());
        assert!(!r.stby.is_asserted());
        assert!(r.drive.is_at_rest());
        assert_eq!(r.drive.targets(), SideDuty::default());

        let writes = r.left.output().writes;
        r.drive.safe_stop().unwrap();
        assert_eq!(r.left.output().writes, writes, "second safe_stop touched hardware");
        assert!(!r.drive.is_enabled());
        assert_eq!(r.drive.current(), SideDuty::default());
    }

    #[test]
    fn test_tick_while_disabled_writes_nothing() {
        let mut r = rig(unity());
        let writes = r.right.output().writes;
        r.drive.tick().unwrap();
        assert_eq!(r.right.output().writes, writes);
    }

    #[test]
    fn test_actuator_fault_forces_safe_stop() {
        let mut r = rig(unity());
        r.drive.drive(0.5, 0.0).unwrap();
        r.drive.tick().unwrap();
        r.right.inject_fault();
        assert!(r.drive.tick().is_err());
        assert!(!r.drive.is_enabled());
        assert!(!r.stby.is_asserted());
        assert_eq!(r.left.output().direction, None);
    }

    #[test]
    fn test_drop_cuts_outputs() {
        let mut r = rig(unity());
        r.drive.drive(0.5, 0.0).unwrap();
        r.drive.tick().unwrap();
        let stby = r.stby.clone();
        let left = r.left.clone();
        drop(r);
        assert!(!stby.is_asserted());
        assert_eq!(left.output().direction, None);
    }
}
