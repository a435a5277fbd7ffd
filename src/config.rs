// Timing, topics, pin mapping and tuning defaults
use std::time::Duration;

// Control loop frequency
pub const LOOP_HZ: u32 = 20;

// Deadman timeout: motors are cut if no command is accepted within this window
pub const DEADMAN_TIMEOUT: Duration = Duration::from_millis(350);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "diffbot/cmd/drive"; // teleop drive commands
pub const TOPIC_CMD_CONTROL: &str = "diffbot/cmd/control"; // mode select, emergency stop
pub const TOPIC_STATUS: &str = "diffbot/state/status"; // status snapshot

// Drive tuning
pub const MAX_DUTY: f32 = 0.6; // conservative cap for phone/keyboard control
pub const LEFT_TRIM: f32 = 1.0;
pub const RIGHT_TRIM: f32 = 0.87; // right motor runs fast on the reference chassis
pub const MAX_STEP_PER_TICK: f32 = 0.1;
pub const MODE_SWITCH_MAX_TICKS: u32 = 25;

// TB6612FNG wiring (BCM numbering)
pub const PWM_FREQUENCY_HZ: f64 = 1000.0;
pub const PIN_PWMA: u8 = 18;
pub const PIN_AIN1: u8 = 23;
pub const PIN_AIN2: u8 = 24;
pub const PIN_PWMB: u8 = 13;
pub const PIN_BIN1: u8 = 6;
pub const PIN_BIN2: u8 = 5;
pub const PIN_STBY: u8 = 25;

// Autonomous wander tuning
pub const AUTO_SPEED: f32 = 0.22;
pub const AUTO_TURN: f32 = 0.55;
pub const AUTO_FWD_S: f32 = 2.0;
pub const AUTO_TURN_S: f32 = 0.5;
pub const AUTO_JITTER_S: f32 = 0.2;
pub const MAX_DWELL_S: f32 = 3600.0; // upper bound for any wander dwell or jitter

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("loop rate must be positive, got {0} Hz")]
    LoopRate(u32),

    #[error("max duty must be in (0, 1], got {0}")]
    MaxDuty(f32),

    #[error("{side} trim must be in (0, 2], got {value}")]
    Trim { side: &'static str, value: f32 },

    #[error("slew step must be in (0, 2], got {0}")]
    SlewStep(f32),

    #[error("deadman timeout must be non-zero")]
    DeadmanTimeout,

    #[error("autonomous {name} must be finite and non-negative, got {value}")]
    Wander { name: &'static str, value: f32 },

    #[error("autonomous {name} must be at most {max}s, got {value}")]
    Dwell {
        name: &'static str,
        value: f32,
        max: f32,
    },
}

/// Shaping applied between a producer's command and the motor channels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveConfig {
    /// Symmetric duty cap applied after trim
    pub max_duty: f32,
    pub left_trim: f32,
    pub right_trim: f32,
    pub max_step_per_tick: f32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_duty: MAX_DUTY,
            left_trim: LEFT_TRIM,
            right_trim: RIGHT_TRIM,
            max_step_per_tick: MAX_STEP_PER_TICK,
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_duty > 0.0 && self.max_duty <= 1.0) {
            return Err(ConfigError::MaxDuty(self.max_duty));
        }
        for (side, value) in [("left", self.left_trim), ("right", self.right_trim)] {
            if !(value > 0.0 && value <= 2.0) {
                return Err(ConfigError::Trim { side, value });
            }
        }
        if !(self.max_step_per_tick > 0.0 && self.max_step_per_tick <= 2.0) {
            return Err(ConfigError::SlewStep(self.max_step_per_tick));
        }
        Ok(())
    }
}

/// Open-loop wander behaviour parameters. Durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderConfig {
    pub speed: f32,
    pub turn: f32,
    pub forward_s: f32,
    pub turn_s: f32,
    pub jitter_s: f32,
    pub seed: u64,
}

impl Default for WanderConfig {
    fn default() -> Self {
        Self {
            speed: AUTO_SPEED,
            turn: AUTO_TURN,
            forward_s: AUTO_FWD_S,
            turn_s: AUTO_TURN_S,
            jitter_s: AUTO_JITTER_S,
            seed: 0,
        }
    }
}

impl WanderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("speed", self.speed),
            ("turn", self.turn),
            ("forward dwell", self.forward_s),
            ("turn dwell", self.turn_s),
            ("jitter", self.jitter_s),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Wander { name, value });
            }
        }
        // Dwell base plus jitter must stay a representable Duration
        for &(name, value) in &fields[2..] {
            if value > MAX_DWELL_S {
                return Err(ConfigError::Dwell {
                    name,
                    value,
                    max: MAX_DWELL_S,
                });
            }
        }
        Ok(())
    }
}

/// Everything the control loop needs, fixed for the process lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub loop_hz: u32,
    pub deadman_timeout: Duration,
    pub mode_switch_max_ticks: u32,
    pub drive: DriveConfig,
    pub wander: WanderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            deadman_timeout: DEADMAN_TIMEOUT,
            mode_switch_max_ticks: MODE_SWITCH_MAX_TICKS,
            drive: DriveConfig::default(),
            wander: WanderConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_hz == 0 {
            return Err(ConfigError::LoopRate(self.loop_hz));
        }
        if self.deadman_timeout.is_zero() {
            return Err(ConfigError::DeadmanTimeout);
        }
        self.drive.validate()?;
        self.wander.validate()
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.loop_hz.max(1)
    }
}

/// BCM pin assignment for one TB6612FNG
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinMap {
    pub pwma: u8,
    pub ain1: u8,
    pub ain2: u8,
    pub pwmb: u8,
    pub bin1: u8,
    pub bin2: u8,
    pub stby: u8,
    pub pwm_frequency_hz: f64,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            pwma: PIN_PWMA,
            ain1: PIN_AIN1,
            ain2: PIN_AIN2,
            pwmb: PIN_PWMB,
            bin1: PIN_BIN1,
            bin2: PIN_BIN2,
            stby: PIN_STBY,
            pwm_frequency_hz: PWM_FREQUENCY_HZ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(RuntimeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_tick_period_at_20hz() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.tick_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_rejects_bad_drive_config() {
        let mut cfg = DriveConfig::default();
        cfg.max_duty = 1.5;
        assert_eq!(cfg.validate(), Err(ConfigError::MaxDuty(1.5)));

        let mut cfg = DriveConfig::default();
        cfg.right_trim = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Trim { side: "right", .. })
        ));

        let mut cfg = DriveConfig::default();
        cfg.max_step_per_tick = f32::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::SlewStep(_))));
    }

    #[test]
    fn test_rejects_zero_loop_rate_and_timeout() {
        let mut cfg = RuntimeConfig::default();
        cfg.loop_hz = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::LoopRate(0)));

        let mut cfg = RuntimeConfig::default();
        cfg.deadman_timeout = Duration::ZERO;
        assert_eq!(cfg.validate(), Err(ConfigError::DeadmanTimeout));
    }

    #[test]
    fn test_rejects_negative_wander_dwell() {
        let mut cfg = WanderConfig::default();
        cfg.jitter_s = -0.1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Wander { name: "jitter", .. })
        ));
    }

    #[test]
    fn test_rejects_huge_wander_dwell() {
        let mut cfg = WanderConfig::default();
        cfg.forward_s = 1e20;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Dwell {
                name: "forward dwell",
                value: 1e20,
                max: MAX_DWELL_S,
            })
        );

        let mut cfg = WanderConfig::default();
        cfg.jitter_s = MAX_DWELL_S + 1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Dwell { name: "jitter", .. })
        ));

        let mut cfg = WanderConfig::default();
        cfg.turn_s = MAX_DWELL_S;
        assert_eq!(cfg.validate(), Ok(()));
    }
}
