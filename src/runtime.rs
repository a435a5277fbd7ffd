// Fixed-cadence control loop with deadman watchdog
//
// One loop owns the whole actuation core. Per tick, in order:
//   1. drain staged producer input (control requests, then the drive slot;
//      a safe stop discards whatever drive command is still pending)
//   2. arbitration step (manual command, wander command, or mode switch)
//   3. deadman check, which can only ever cut the outputs after step 2
//   4. slew-limited drive tick
// Producers never touch the drive directly, so a command can not be applied
// concurrently with a safe stop.

use std::time::{Duration, Instant};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::arbiter::CommandArbiter;
use crate::config::RuntimeConfig;
use crate::messages::{ControlRequest, DriveCommand, Mode, StatusSnapshot};
use crate::motor::{DriveController, EnableLine, HardwareActuator, actuator};
use crate::slot::Inbox;
use crate::watchdog::DeadmanWatchdog;

pub struct Runtime<A: HardwareActuator, E: EnableLine> {
    drive: DriveController<A, E>,
    watchdog: DeadmanWatchdog,
    arbiter: CommandArbiter,
}

impl<A: HardwareActuator, E: EnableLine> Runtime<A, E> {
    pub fn new(drive: DriveController<A, E>, config: &RuntimeConfig) -> Self {
        Self {
            drive,
            watchdog: DeadmanWatchdog::new(config.deadman_timeout),
            arbiter: CommandArbiter::new(config.wander, config.mode_switch_max_ticks),
        }
    }

    /// Validate a producer command and stage it for the next tick
    ///
    /// Non-finite values are rejected and the previous target is kept;
    /// out-of-range values are clamped.
    pub fn on_command(&mut self, cmd: DriveCommand) {
        match cmd.sanitize() {
            Ok((sanitized, clamped)) => {
                if clamped {
                    warn!("Command out of range, clamped: {:?} -> {:?}", cmd, sanitized);
                }
                self.arbiter.stage(sanitized);
            }
            Err(e) => warn!("Rejected command {:?}: {}", cmd, e),
        }
    }

    pub fn on_control(&mut self, request: ControlRequest) -> actuator::Result<()> {
        match request {
            ControlRequest::SelectMode { mode } => {
                self.select_mode(mode);
                Ok(())
            }
            ControlRequest::SafeStop => self.safe_stop(),
        }
    }

    pub fn drive(&mut self, forward: f32, turn: f32) {
        self.on_command(DriveCommand::Arcade { forward, turn });
    }

    pub fn stop(&mut self) {
        self.on_command(DriveCommand::Stop);
    }

    pub fn select_mode(&mut self, mode: Mode) {
        self.arbiter.select_mode(mode);
    }

    /// Cut the outputs now. Leaves autonomous mode so the wander loop can not
    /// immediately re-enable the driver.
    pub fn safe_stop(&mut self) -> actuator::Result<()> {
        info!("Safe stop requested");
        self.arbiter.discard_staged();
        self.drive.safe_stop()?;
        if self.arbiter.mode() == Mode::Autonomous || self.arbiter.is_switching() {
            self.arbiter.select_mode(Mode::Manual);
        }
        Ok(())
    }

    /// Pull everything producers staged since the last tick
    pub fn drain(&mut self, inbox: &mut Inbox) -> actuator::Result<()> {
        while let Some(request) = inbox.next_control() {
            if request == ControlRequest::SafeStop {
                // Never let a pending drive command outlive the stop
                if let Some(cmd) = inbox.discard_command() {
                    debug!("Dropped {:?} pending at safe stop", cmd);
                }
            }
            self.on_control(request)?;
        }
        if let Some(cmd) = inbox.take_command() {
            self.on_command(cmd);
        }
        Ok(())
    }

    /// One control step. An error is an actuator fault: the outputs have
    /// already been cut and the caller must stop driving.
    pub fn tick(&mut self, now: Instant) -> actuator::Result<StatusSnapshot> {
        self.arbiter
            .step(now, &mut self.drive, &mut self.watchdog)?;
        self.watchdog.check(now, &mut self.drive)?;
        self.drive.tick()?;
        Ok(self.status(now))
    }

    pub fn status(&self, now: Instant) -> StatusSnapshot {
        let current = self.drive.current();
        StatusSnapshot {
            enabled: self.drive.is_enabled(),
            mode: self.arbiter.mode(),
            switching: self.arbiter.is_switching(),
            deadman_tripped: self.watchdog.is_tripped(),
            current_left_duty: current.left,
            current_right_duty: current.right,
            command_age_ms: self
                .watchdog
                .command_age(now)
                .map(|age| u64::try_from(age.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// Drive the control loop until shutdown or an actuator fault
///
/// Producers reach the loop only through the `RuntimeHandle` paired with
/// `inbox`; each snapshot is published back on it once per tick.
pub async fn run<A, E>(
    drive: DriveController<A, E>,
    config: RuntimeConfig,
    mut inbox: Inbox,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    A: HardwareActuator,
    E: EnableLine,
{
    let mut runtime = Runtime::new(drive, &config);
    let mut tick = interval(config.tick_period());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!(
        "Runtime started: {}Hz loop, {}ms deadman timeout",
        config.loop_hz,
        config.deadman_timeout.as_millis()
    );

    let mut last_logged = Instant::now();
    let outcome: Result<(), Box<dyn std::error::Error + Send + Sync>> = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break Ok(());
            }
            _ = tick.tick() => {}
        }

        let now = Instant::now();
        let status = match runtime.drain(&mut inbox).and_then(|_| runtime.tick(now)) {
            Ok(status) => status,
            Err(e) => {
                error!("Actuator fault, motors cut: {}", e);
                break Err(e.into());
            }
        };

        // Latest-value publish; readers never hold up the loop
        inbox.publish(status);

        if now.duration_since(last_logged) >= Duration::from_secs(1) {
            debug!("Status: {:?}", status);
            last_logged = now;
        }
    };

    if let Err(e) = runtime.safe_stop() {
        error!("Safe stop on exit failed: {}", e);
    }
    info!("Runtime stopped");
    outcome
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
