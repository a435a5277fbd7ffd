// TB6612FNG backend on the Raspberry Pi GPIO header
//
// Each motor uses IN1/IN2 for direction and a software PWM pin for duty.
// Both direction pins low with zero duty lets the motor coast.

use rppal::gpio::{Gpio, OutputPin};
use tracing::info;

use super::actuator::{Direction, EnableLine, HardwareActuator, Result};
use crate::config::PinMap;

pub struct GpioMotor {
    pwm: OutputPin,
    in1: OutputPin,
    in2: OutputPin,
    frequency_hz: f64,
}

impl HardwareActuator for GpioMotor {
    fn set(&mut self, direction: Direction, duty: f32) -> Result<()> {
        match direction {
            Direction::Forward => {
                self.in2.set_low();
                self.in1.set_high();
            }
            Direction::Reverse => {
                self.in1.set_low();
                self.in2.set_high();
            }
        }
        let duty = f64::from(duty.clamp(0.0, 1.0));
        self.pwm.set_pwm_frequency(self.frequency_hz, duty)?;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.pwm.set_pwm_frequency(self.frequency_hz, 0.0)?;
        self.in1.set_low();
        self.in2.set_low();
        Ok(())
    }
}

pub struct GpioStandby {
    pin: OutputPin,
}

impl EnableLine for GpioStandby {
    fn assert(&mut self) -> Result<()> {
        self.pin.set_high();
        Ok(())
    }

    fn deassert(&mut self) -> Result<()> {
        self.pin.set_low();
        Ok(())
    }
}

/// Claim the driver's pins. Every output starts low.
pub fn open_tb6612(pins: &PinMap) -> Result<(GpioMotor, GpioMotor, GpioStandby)> {
    let gpio = Gpio::new()?;
    let output = |pin: u8| -> Result<OutputPin> { Ok(gpio.get(pin)?.into_output_low()) };

    info!(
        "Opening TB6612FNG: A(pwm={}, in={}/{}), B(pwm={}, in={}/{}), STBY={}",
        pins.pwma, pins.ain1, pins.ain2, pins.pwmb, pins.bin1, pins.bin2, pins.stby
    );

    let left = GpioMotor {
        pwm: output(pins.pwma)?,
        in1: output(pins.ain1)?,
        in2: output(pins.ain2)?,
        frequency_hz: pins.pwm_frequency_hz,
    };
    let right = GpioMotor {
        pwm: output(pins.pwmb)?,
        in1: output(pins.bin1)?,
        in2: output(pins.bin2)?,
        frequency_hz: pins.pwm_frequency_hz,
    };
    let standby = GpioStandby {
        pin: output(pins.stby)?,
    };
    Ok((left, right, standby))
}
