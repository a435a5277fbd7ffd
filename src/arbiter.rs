// Command arbitration and mode state machine
//
// Exactly one producer owns the drive at a time. Switching producers always
// passes through a stop: targets go to zero, the loop waits (bounded) for the
// channels to come to rest, then a safe stop is applied and the new mode is
// committed on that tick.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::WanderConfig;
use crate::messages::{DriveCommand, Mode};
use crate::motor::{DriveController, EnableLine, HardwareActuator, actuator};
use crate::wander::AutonomousWander;
use crate::watchdog::DeadmanWatchdog;

/// Something that can hand the arbiter a drive command once per tick
pub trait CommandProducer {
    fn next_command(&mut self, now: Instant) -> Option<DriveCommand>;
}

/// Teleop side: the latest staged command, consumed at most once
#[derive(Debug, Default)]
pub struct ManualProducer {
    slot: Option<DriveCommand>,
}

impl ManualProducer {
    /// Stage a command; a newer one replaces an unconsumed older one
    pub fn stage(&mut self, cmd: DriveCommand) {
        if let Some(old) = self.slot.replace(cmd) {
            debug!("Superseded unconsumed command {:?}", old);
        }
    }

    pub fn clear(&mut self) -> Option<DriveCommand> {
        self.slot.take()
    }
}

impl CommandProducer for ManualProducer {
    fn next_command(&mut self, _now: Instant) -> Option<DriveCommand> {
        self.slot.take()
    }
}

impl CommandProducer for AutonomousWander {
    fn next_command(&mut self, now: Instant) -> Option<DriveCommand> {
        let (forward, turn) = AutonomousWander::next_command(self, now);
        Some(DriveCommand::Arcade { forward, turn })
    }
}

/// The closed set of producers the arbiter can select between
pub enum ActiveProducer {
    Manual(ManualProducer),
    Autonomous(AutonomousWander),
}

impl ActiveProducer {
    pub fn mode(&self) -> Mode {
        match self {
            ActiveProducer::Manual(_) => Mode::Manual,
            ActiveProducer::Autonomous(_) => Mode::Autonomous,
        }
    }
}

impl CommandProducer for ActiveProducer {
    fn next_command(&mut self, now: Instant) -> Option<DriveCommand> {
        match self {
            ActiveProducer::Manual(p) => p.next_command(now),
            ActiveProducer::Autonomous(p) => CommandProducer::next_command(p, now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Switch {
    to: Mode,
    ticks_waited: u32,
}

pub struct CommandArbiter {
    producer: ActiveProducer,
    switching: Option<Switch>,
    max_switch_ticks: u32,
    wander_config: WanderConfig,
}

impl CommandArbiter {
    pub fn new(wander_config: WanderConfig, max_switch_ticks: u32) -> Self {
        Self {
            producer: ActiveProducer::Manual(ManualProducer::default()),
            switching: None,
            max_switch_ticks,
            wander_config,
        }
    }

    /// Committed mode; unchanged until a pending switch completes
    pub fn mode(&self) -> Mode {
        self.producer.mode()
    }

    pub fn is_switching(&self) -> bool {
        self.switching.is_some()
    }

    pub fn pending_mode(&self) -> Option<Mode> {
        self.switching.map(|s| s.to)
    }

    /// Request a mode; repeated requests during a switch coalesce (last wins)
    pub fn select_mode(&mut self, mode: Mode) {
        if let Some(switch) = self.switching.as_mut() {
            if switch.to != mode {
                info!("Mode switch retargeted: {:?} -> {:?}", switch.to, mode);
                switch.to = mode;
            }
            return;
        }

        let current = self.mode();
        if mode == current {
            debug!("Already in {:?} mode", mode);
            return;
        }
        info!("Mode switch requested: {:?} -> {:?}", current, mode);
        self.switching = Some(Switch {
            to: mode,
            ticks_waited: 0,
        });
    }

    /// Stage a teleop command. Only the manual producer consumes it; in any
    /// other state it is dropped.
    pub fn stage(&mut self, cmd: DriveCommand) {
        match &mut self.producer {
            ActiveProducer::Manual(manual) if self.switching.is_none() => manual.stage(cmd),
            _ => debug!("Ignoring teleop command outside manual mode: {:?}", cmd),
        }
    }

    /// Drop a staged teleop command that has not been applied yet
    pub fn discard_staged(&mut self) {
        if let ActiveProducer::Manual(manual) = &mut self.producer {
            if let Some(cmd) = manual.clear() {
                debug!("Discarded staged command {:?}", cmd);
            }
        }
    }

    /// One arbitration step. Runs before the watchdog check and the drive tick.
    pub fn step<A, E>(
        &mut self,
        now: Instant,
        drive: &mut DriveController<A, E>,
        watchdog: &mut DeadmanWatchdog,
    ) -> actuator::Result<()>
    where
        A: HardwareActuator,
        E: EnableLine,
    {
        if let Some(switch) = self.switching {
            return self.step_switch(switch, now, drive);
        }

        if let Some(cmd) = self.producer.next_command(now) {
            apply(cmd, drive)?;
            watchdog.notify_command(now);
        }
        Ok(())
    }

    fn step_switch<A, E>(
        &mut self,
        switch: Switch,
        now: Instant,
        drive: &mut DriveController<A, E>,
    ) -> actuator::Result<()>
    where
        A: HardwareActuator,
        E: EnableLine,
    {
        if !drive.is_at_rest() {
            if switch.ticks_waited < self.max_switch_ticks {
                drive.stop();
                self.switching = Some(Switch {
                    ticks_waited: switch.ticks_waited + 1,
                    ..switch
                });
                return Ok(());
            }
            warn!(
                "Motors not at rest after {} ticks, forcing safe stop for mode switch",
                switch.ticks_waited
            );
        }

        // Always cross a mode boundary through a safe stop
        drive.safe_stop()?;
        self.commit(switch.to, now);
        Ok(())
    }

    fn commit(&mut self, mode: Mode, now: Instant) {
        self.switching = None;
        self.producer = match mode {
            Mode::Manual => ActiveProducer::Manual(ManualProducer::default()),
            Mode::Autonomous => {
                ActiveProducer::Autonomous(AutonomousWander::new(self.wander_config, now))
            }
        };
        info!("Mode committed: {:?}", mode);
    }
}

fn apply<A, E>(cmd: DriveCommand, drive: &mut DriveController<A, E>) -> actuator::Result<()>
where
    A: HardwareActuator,
    E: EnableLine,
{
    match cmd {
        DriveCommand::Arcade { forward, turn } => drive.drive(forward, turn),
        DriveCommand::Tank { left, right } => drive.drive_tank(left, right),
        DriveCommand::Stop => {
            drive.stop();
            Ok(())
        }
    }
}
