// Keyboard teleop: WASD move, SPACE stop, R/F speed, M toggle mode, X safe stop, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use diffbot_runtime::config::{TOPIC_CMD_CONTROL, TOPIC_CMD_DRIVE, TOPIC_STATUS};
use diffbot_runtime::messages::{ControlRequest, DriveCommand, Mode, StatusSnapshot};

const SPEEDS: [f32; 3] = [0.25, 0.45, 0.7]; // forward duty
const TURN_SPEEDS: [f32; 3] = [0.25, 0.4, 0.55]; // turn duty
const INPUT_TIMEOUT_MS: u64 = 600; // Zero the command after this much time with no input
const MODE_REQUEST_GRACE_MS: u64 = 500; // Trust our own mode request this long over status

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_drive = session.declare_publisher(TOPIC_CMD_DRIVE).await?;
    let pub_control = session.declare_publisher(TOPIC_CMD_CONTROL).await?;

    info!("Controls: WASD=move, SPACE=stop, R/F=speed, M=mode, X=safe stop, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&session, &pub_drive, &pub_control).await;
    disable_raw_mode()?;

    // Leave the robot stopped whatever happened above
    pub_drive.put(serde_json::to_string(&DriveCommand::Stop)?).await?;
    result
}

async fn run_teleop(
    session: &zenoh::Session,
    pub_drive: &zenoh::pubsub::Publisher<'_>,
    pub_control: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let sub_status = session.declare_subscriber(TOPIC_STATUS).await?;
    let mut teleop = Teleop::new(Instant::now());

    loop {
        while let Ok(Some(sample)) = sub_status.try_recv() {
            if let Ok(status) =
                serde_json::from_slice::<StatusSnapshot>(&sample.payload().to_bytes())
            {
                teleop.on_status(&status, Instant::now());
            }
        }

        // Poll for key with 50ms timeout (20Hz effective rate)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                if pressed {
                    match teleop.on_key(code, Instant::now()) {
                        KeyAction::Quit => break,
                        KeyAction::Control(request) => {
                            pub_control.put(serde_json::to_string(&request)?).await?;
                        }
                        KeyAction::None => {}
                    }
                }
            }
        }

        // Always publish so the runtime deadman stays fed while we are alive
        let cmd = teleop.command(Instant::now());
        pub_drive.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
enum KeyAction {
    None,
    Control(ControlRequest),
    Quit,
}

/// Keyboard state between publishes
struct Teleop {
    speed_idx: usize,
    mode: Mode,
    mode_requested_at: Option<Instant>,
    forward: f32,
    turn: f32,
    last_movement_input: Instant,
}

impl Teleop {
    fn new(now: Instant) -> Self {
        Self {
            speed_idx: 0,
            mode: Mode::Manual,
            mode_requested_at: None,
            forward: 0.0,
            turn: 0.0,
            last_movement_input: now,
        }
    }

    fn on_key(&mut self, code: KeyCode, now: Instant) -> KeyAction {
        match code {
            // Movement - update command and refresh timestamp
            KeyCode::Char('w') => self.set_motion(SPEEDS[self.speed_idx], 0.0, now),
            KeyCode::Char('s') => self.set_motion(-SPEEDS[self.speed_idx], 0.0, now),
            KeyCode::Char('a') => self.set_motion(0.0, -TURN_SPEEDS[self.speed_idx], now),
            KeyCode::Char('d') => self.set_motion(0.0, TURN_SPEEDS[self.speed_idx], now),
            KeyCode::Char(' ') => self.set_motion(0.0, 0.0, now),

            // Speed control
            KeyCode::Char('r') => {
                self.speed_idx = (self.speed_idx + 1).min(2);
                print_speed(self.speed_idx);
            }
            KeyCode::Char('f') => {
                self.speed_idx = self.speed_idx.saturating_sub(1);
                print_speed(self.speed_idx);
            }

            // Mode and emergency stop
            KeyCode::Char('m') => {
                self.mode = self.mode.toggled();
                self.mode_requested_at = Some(now);
                info!("Requesting {:?} mode", self.mode);
                return KeyAction::Control(ControlRequest::SelectMode { mode: self.mode });
            }
            KeyCode::Char('x') => {
                info!("Safe stop");
                self.set_motion(0.0, 0.0, now);
                self.mode = Mode::Manual;
                self.mode_requested_at = Some(now);
                return KeyAction::Control(ControlRequest::SafeStop);
            }

            KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
            _ => {}
        }
        KeyAction::None
    }

    /// Follow the runtime's committed mode unless our own request is in flight
    fn on_status(&mut self, status: &StatusSnapshot, now: Instant) {
        let in_flight = self.mode_requested_at.is_some_and(|at| {
            now.saturating_duration_since(at) < Duration::from_millis(MODE_REQUEST_GRACE_MS)
        });
        if status.switching || (in_flight && status.mode != self.mode) {
            return;
        }
        self.mode_requested_at = None;
        if status.mode != self.mode {
            info!("Runtime is in {:?} mode", status.mode);
            self.mode = status.mode;
        }
    }

    fn command(&mut self, now: Instant) -> DriveCommand {
        // Zero the command if no movement input for INPUT_TIMEOUT_MS
        if now.saturating_duration_since(self.last_movement_input)
            > Duration::from_millis(INPUT_TIMEOUT_MS)
        {
            self.forward = 0.0;
            self.turn = 0.0;
        }

        if self.forward == 0.0 && self.turn == 0.0 {
            DriveCommand::Stop
        } else {
            DriveCommand::Arcade {
                forward: self.forward,
                turn: self.turn,
            }
        }
    }

    fn set_motion(&mut self, forward: f32, turn: f32, now: Instant) {
        self.forward = forward;
        self.turn = turn;
        self.last_movement_input = now;
    }
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
