// Autonomous wander: open-loop forward/turn cycle with jittered dwell times.
//
// There is no obstacle sensing; `Paused` is the hook for sensor-gated stops.
// All randomness comes from a seeded generator so a run can be replayed.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{MAX_DWELL_S, WanderConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WanderState {
    Forward,
    /// Turning in place; the sign is picked on entry
    Turning { direction: f32 },
    Paused,
}

pub struct AutonomousWander {
    config: WanderConfig,
    rng: StdRng,
    state: WanderState,
    dwell_until: Instant,
}

impl AutonomousWander {
    /// Start a fresh cycle in `Forward`
    pub fn new(config: WanderConfig, now: Instant) -> Self {
        let mut wander = Self {
            config,
            rng: StdRng::seed_from_u64(config.seed),
            state: WanderState::Forward,
            dwell_until: now,
        };
        wander.enter(WanderState::Forward, now);
        wander
    }

    /// Reseed and start over; replays the same sequence as a new instance
    pub fn restart(&mut self, now: Instant) {
        *self = Self::new(self.config, now);
    }

    /// Command for this tick as `(forward, turn)`, advancing the state on expiry
    pub fn next_command(&mut self, now: Instant) -> (f32, f32) {
        if now >= self.dwell_until {
            let next = match self.state {
                WanderState::Forward => {
                    let direction = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                    WanderState::Turning { direction }
                }
                WanderState::Turning { .. } | WanderState::Paused => WanderState::Forward,
            };
            self.enter(next, now);
        }

        match self.state {
            WanderState::Forward => (self.config.speed, 0.0),
            WanderState::Turning { direction } => (0.0, direction * self.config.turn),
            WanderState::Paused => (0.0, 0.0),
        }
    }

    /// Hold still for `duration`, then resume with `Forward`
    pub fn pause(&mut self, now: Instant, duration: Duration) {
        self.state = WanderState::Paused;
        self.dwell_until = now.checked_add(duration).unwrap_or(now);
        debug!("Wander paused for {:?}", duration);
    }

    pub fn state(&self) -> WanderState {
        self.state
    }

    pub fn dwell_until(&self) -> Instant {
        self.dwell_until
    }

    fn enter(&mut self, state: WanderState, now: Instant) {
        let base = match state {
            WanderState::Forward => self.config.forward_s,
            WanderState::Turning { .. } => self.config.turn_s,
            WanderState::Paused => 0.0,
        };
        let dwell = self.jittered(base);
        self.state = state;
        self.dwell_until = now.checked_add(dwell).unwrap_or(now);
        debug!("Wander -> {:?} for {:?}", state, dwell);
    }

    fn jittered(&mut self, base_s: f32) -> Duration {
        let jitter = self.config.jitter_s;
        let offset = if jitter > 0.0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        // Unvalidated configs must not panic here
        Duration::try_from_secs_f32((base_s + offset).clamp(0.0, MAX_DWELL_S))
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(50);

    fn config(seed: u64) -> WanderConfig {
        WanderConfig {
            speed: 0.22,
            turn: 0.55,
            forward_s: 1.0,
            turn_s: 0.4,
            jitter_s: 0.2,
            seed,
        }
    }

    /// Run for `ticks` and record every (state, dwell) transition
    fn transitions(wander: &mut AutonomousWander, t0: Instant, ticks: u32) -> Vec<(WanderState, Duration)> {
        let mut log = vec![(wander.state(), wander.dwell_until() - t0)];
        for i in 1..=ticks {
            let now = t0 + TICK * i;
            let before = (wander.state(), wander.dwell_until());
            wander.next_command(now);
            if (wander.state(), wander.dwell_until()) != before {
                log.push((wander.state(), wander.dwell_until() - t0));
            }
        }
        log
    }

    #[test]
    fn test_starts_forward() {
        let t0 = Instant::now();
        let mut wander = AutonomousWander::new(config(1), t0);
        assert_eq!(wander.state(), WanderState::Forward);
        assert_eq!(wander.next_command(t0), (0.22, 0.0));
    }

    #[test]
    fn test_forward_dwell_within_jitter() {
        let t0 = Instant::now();
        for seed in 0..20 {
            let wander = AutonomousWander::new(config(seed), t0);
            let dwell = (wander.dwell_until() - t0).as_secs_f32();
            assert!((0.79..=1.21).contains(&dwell), "dwell {} out of range", dwell);
        }
    }

    #[test]
    fn test_alternates_forward_and_turning() {
        let t0 = Instant::now();
        let mut wander = AutonomousWander::new(config(7), t0);
        let log = transitions(&mut wander, t0, 200);
        assert!(log.len() > 4);
        for pair in log.windows(2) {
            match (pair[0].0, pair[1].0) {
                (WanderState::Forward, WanderState::Turning { direction }) => {
                    assert!(direction == 1.0 || direction == -1.0)
                }
                (WanderState::Turning { .. }, WanderState::Forward) => {}
                other => panic!("unexpected transition {:?}", other),
            }
        }
    }

    #[test]
    fn test_turning_emits_pure_rotation() {
        let t0 = Instant::now();
        let mut wander = AutonomousWander::new(config(3), t0);
        let after_forward = wander.dwell_until() + TICK;
        let (forward, turn) = wander.next_command(after_forward);
        assert_eq!(forward, 0.0);
        assert!((turn.abs() - 0.55).abs() < f32::EPSILON);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let t0 = Instant::now();
        let mut a = AutonomousWander::new(config(42), t0);
        let mut b = AutonomousWander::new(config(42), t0);
        assert_eq!(transitions(&mut a, t0, 300), transitions(&mut b, t0, 300));
    }

    #[test]
    fn test_restart_replays_sequence() {
        let t0 = Instant::now();
        let mut wander = AutonomousWander::new(config(9), t0);
        let first = transitions(&mut wander, t0, 300);
        wander.restart(t0);
        assert_eq!(transitions(&mut wander, t0, 300), first);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let t0 = Instant::now();
        let a = AutonomousWander::new(config(1), t0);
        let b = AutonomousWander::new(config(2), t0);
        assert_ne!(a.dwell_until(), b.dwell_until());
    }

    #[test]
    fn test_pause_emits_zero_then_resumes_forward() {
        let t0 = Instant::now();
        let mut wander = AutonomousWander::new(config(5), t0);
        wander.pause(t0, Duration::from_millis(200));
        assert_eq!(wander.next_command(t0 + TICK), (0.0, 0.0));
        assert_eq!(wander.state(), WanderState::Paused);
        assert_eq!(wander.next_command(t0 + Duration::from_millis(250)), (0.22, 0.0));
        assert_eq!(wander.state(), WanderState::Forward);
    }

    #[test]
    fn test_oversized_dwell_is_capped_not_panicking() {
        let t0 = Instant::now();
        let huge = WanderConfig {
            forward_s: 1e20,
            jitter_s: 0.0,
            ..config(4)
        };
        let mut wander = AutonomousWander::new(huge, t0);
        let dwell = wander.dwell_until() - t0;
        assert_eq!(dwell, Duration::from_secs_f32(MAX_DWELL_S));
        assert_eq!(wander.next_command(t0 + TICK), (0.22, 0.0));

        wander.pause(t0, Duration::MAX);
        assert_eq!(wander.state(), WanderState::Paused);
    }
}
