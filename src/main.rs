use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use diffbot_runtime::config::{self, DriveConfig, PinMap, RuntimeConfig, WanderConfig};
use diffbot_runtime::motor::{DriveController, EnableLine, HardwareActuator};
use diffbot_runtime::{runtime, slot, transport};

/// Actuation runtime for a two-wheel TB6612FNG base
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Control loop rate
    #[arg(long, env = "LOOP_HZ", default_value_t = config::LOOP_HZ)]
    loop_hz: u32,

    /// Seconds without an accepted command before the motors are cut
    #[arg(long, env = "DEADMAN_S", default_value_t = config::DEADMAN_TIMEOUT.as_secs_f32())]
    deadman_s: f32,

    /// Duty cap applied to both sides
    #[arg(long, env = "MAX_PWM", default_value_t = config::MAX_DUTY)]
    max_pwm: f32,

    #[arg(long, env = "LEFT_MULT", default_value_t = config::LEFT_TRIM)]
    left_mult: f32,

    #[arg(long, env = "RIGHT_MULT", default_value_t = config::RIGHT_TRIM)]
    right_mult: f32,

    /// Maximum duty change per control tick
    #[arg(long, env = "SLEW_STEP", default_value_t = config::MAX_STEP_PER_TICK)]
    slew_step: f32,

    /// Ticks to wait for the motors to stop before forcing a mode switch
    #[arg(long, env = "MODE_SWITCH_TICKS", default_value_t = config::MODE_SWITCH_MAX_TICKS)]
    mode_switch_ticks: u32,

    #[arg(long, env = "AUTO_SPEED", default_value_t = config::AUTO_SPEED)]
    auto_speed: f32,

    #[arg(long, env = "AUTO_TURN", default_value_t = config::AUTO_TURN)]
    auto_turn: f32,

    #[arg(long, env = "AUTO_FWD_S", default_value_t = config::AUTO_FWD_S)]
    auto_fwd_s: f32,

    #[arg(long, env = "AUTO_TURN_S", default_value_t = config::AUTO_TURN_S)]
    auto_turn_s: f32,

    #[arg(long, env = "AUTO_JITTER_S", default_value_t = config::AUTO_JITTER_S)]
    auto_jitter_s: f32,

    /// Wander seed; derived from the clock and logged when omitted
    #[arg(long, env = "AUTO_SEED")]
    auto_seed: Option<u64>,

    /// Use the simulated motor backend instead of GPIO
    #[arg(long, env = "SIM")]
    sim: bool,

    #[arg(long, env = "PWMA", default_value_t = config::PIN_PWMA)]
    pwma: u8,
    #[arg(long, env = "AIN1", default_value_t = config::PIN_AIN1)]
    ain1: u8,
    #[arg(long, env = "AIN2", default_value_t = config::PIN_AIN2)]
    ain2: u8,
    #[arg(long, env = "PWMB", default_value_t = config::PIN_PWMB)]
    pwmb: u8,
    #[arg(long, env = "BIN1", default_value_t = config::PIN_BIN1)]
    bin1: u8,
    #[arg(long, env = "BIN2", default_value_t = config::PIN_BIN2)]
    bin2: u8,
    #[arg(long, env = "STBY", default_value_t = config::PIN_STBY)]
    stby: u8,
}

impl Args {
    fn runtime_config(&self) -> Result<RuntimeConfig, Box<dyn std::error::Error + Send + Sync>> {
        let seed = self.auto_seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        });
        info!("Wander seed: {}", seed);

        let deadman_timeout = Duration::try_from_secs_f32(self.deadman_s)
            .map_err(|e| format!("invalid deadman timeout {}: {}", self.deadman_s, e))?;

        let config = RuntimeConfig {
            loop_hz: self.loop_hz,
            deadman_timeout,
            mode_switch_max_ticks: self.mode_switch_ticks,
            drive: DriveConfig {
                max_duty: self.max_pwm,
                left_trim: self.left_mult,
                right_trim: self.right_mult,
                max_step_per_tick: self.slew_step,
            },
            wander: WanderConfig {
                speed: self.auto_speed,
                turn: self.auto_turn,
                forward_s: self.auto_fwd_s,
                turn_s: self.auto_turn_s,
                jitter_s: self.auto_jitter_s,
                seed,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn pins(&self) -> PinMap {
        PinMap {
            pwma: self.pwma,
            ain1: self.ain1,
            ain2: self.ain2,
            pwmb: self.pwmb,
            bin1: self.bin1,
            bin2: self.bin2,
            stby: self.stby,
            ..PinMap::default()
        }
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = start(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn start(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = args.runtime_config()?;

    #[cfg(feature = "rpi")]
    {
        if !args.sim {
            let (left, right, standby) =
                diffbot_runtime::motor::gpio::open_tb6612(&args.pins())?;
            let drive = DriveController::new(left, right, standby, config.drive)?;
            return serve(drive, config).await;
        }
    }

    #[cfg(not(feature = "rpi"))]
    {
        if !args.sim {
            info!("Built without GPIO support, using simulated motors");
        }
    }
    info!("Simulated backend (pins would be {:?})", args.pins());
    let drive = DriveController::new(
        diffbot_runtime::motor::SimActuator::new("left"),
        diffbot_runtime::motor::SimActuator::new("right"),
        diffbot_runtime::motor::SimEnableLine::new(),
        config.drive,
    )?;
    serve(drive, config).await
}

/// Control loop plus the zenoh bridge feeding it
async fn serve<A, E>(
    drive: DriveController<A, E>,
    config: RuntimeConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    A: HardwareActuator,
    E: EnableLine,
{
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let (handle, inbox) = slot::channel();
    let bridge = tokio::spawn(async move {
        if let Err(e) = transport::serve(session, handle).await {
            error!("Transport stopped: {}", e);
        }
    });

    let outcome = runtime::run(drive, config, inbox).await;
    bridge.abort();
    outcome
}
