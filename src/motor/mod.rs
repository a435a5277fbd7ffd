// Motor control for the two-wheel base
//
// Provides:
// - Hardware capability traits (motor output, standby line) with a simulated backend
// - Slew-rate limited motor channels
// - Differential drive controller with the safe-stop path
// - TB6612FNG GPIO backend (feature `rpi`)

pub mod actuator;
mod channel;
mod drive;
#[cfg(feature = "rpi")]
pub mod gpio;

pub use actuator::{
    ActuatorError, Direction, EnableLine, HardwareActuator, SimActuator, SimEnableLine,
};
pub use channel::MotorChannel;
pub use drive::{DriveController, SideDuty, arcade_mix};
