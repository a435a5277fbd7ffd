// Producer-facing handle to the control loop
//
// Drive commands go through a depth-1 latest-value-wins slot: a newer command
// replaces one the loop has not consumed yet. Mode selection and emergency
// stops use a separate queue so drive traffic can never overwrite them.
// Only the control loop reads either, which keeps command application and
// safe stop on one thread.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::messages::{ControlRequest, DriveCommand, Mode, StatusSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("control loop is not running")]
pub struct Closed;

/// Cloneable handle for command producers and status readers
#[derive(Clone)]
pub struct RuntimeHandle {
    drive: Arc<watch::Sender<Option<DriveCommand>>>,
    control: mpsc::UnboundedSender<ControlRequest>,
    status: watch::Receiver<StatusSnapshot>,
}

/// Loop side of the handle
pub struct Inbox {
    drive: watch::Receiver<Option<DriveCommand>>,
    control: mpsc::UnboundedReceiver<ControlRequest>,
    status: watch::Sender<StatusSnapshot>,
}

pub fn channel() -> (RuntimeHandle, Inbox) {
    let (drive_tx, drive_rx) = watch::channel(None);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
    (
        RuntimeHandle {
            drive: Arc::new(drive_tx),
            control: control_tx,
            status: status_rx,
        },
        Inbox {
            drive: drive_rx,
            control: control_rx,
            status: status_tx,
        },
    )
}

impl RuntimeHandle {
    /// Stage a drive command, replacing any unconsumed one
    pub fn submit(&self, cmd: DriveCommand) -> Result<(), Closed> {
        if self.drive.is_closed() {
            return Err(Closed);
        }
        self.drive.send_replace(Some(cmd));
        Ok(())
    }

    pub fn drive(&self, forward: f32, turn: f32) -> Result<(), Closed> {
        self.submit(DriveCommand::Arcade { forward, turn })
    }

    pub fn stop(&self) -> Result<(), Closed> {
        self.submit(DriveCommand::Stop)
    }

    pub fn request(&self, request: ControlRequest) -> Result<(), Closed> {
        self.control.send(request).map_err(|_| Closed)
    }

    pub fn select_mode(&self, mode: Mode) -> Result<(), Closed> {
        self.request(ControlRequest::SelectMode { mode })
    }

    pub fn safe_stop(&self) -> Result<(), Closed> {
        self.request(ControlRequest::SafeStop)
    }

    /// Latest snapshot published by the loop
    pub fn status(&self) -> StatusSnapshot {
        *self.status.borrow()
    }

    /// Wait for the next published snapshot
    pub async fn status_changed(&mut self) -> Result<StatusSnapshot, Closed> {
        self.status.changed().await.map_err(|_| Closed)?;
        Ok(*self.status.borrow_and_update())
    }
}

impl Inbox {
    /// The newest drive command staged since the last call, if any
    pub fn take_command(&mut self) -> Option<DriveCommand> {
        match self.drive.has_changed() {
            Ok(true) => *self.drive.borrow_and_update(),
            _ => None,
        }
    }

    /// Drop the staged drive command without applying it
    pub fn discard_command(&mut self) -> Option<DriveCommand> {
        self.take_command()
    }

    /// Next queued control request, in arrival order
    pub fn next_control(&mut self) -> Option<ControlRequest> {
        self.control.try_recv().ok()
    }

    pub fn publish(&self, status: StatusSnapshot) {
        self.status.send_replace(status);
    }
}
