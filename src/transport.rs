// Zenoh bridge between the network and the control loop
//
// Inbound drive and control messages are decoded and handed to the
// `RuntimeHandle`; status snapshots are re-published as JSON. Runs as its own
// task so network I/O never sits inside the control tick.

use tracing::{debug, info, warn};

use crate::config::{TOPIC_CMD_CONTROL, TOPIC_CMD_DRIVE, TOPIC_STATUS};
use crate::messages::{ControlRequest, DriveCommand, StatusSnapshot};
use crate::slot::{Closed, RuntimeHandle};

pub async fn serve(
    session: zenoh::Session,
    handle: RuntimeHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Setting up publishers and subscribers...");
    let sub_drive = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_control = session.declare_subscriber(TOPIC_CMD_CONTROL).await?;
    let pub_status = session.declare_publisher(TOPIC_STATUS).await?;

    info!("Subscribed to: {}, {}", TOPIC_CMD_DRIVE, TOPIC_CMD_CONTROL);
    info!("Publishing to: {}", TOPIC_STATUS);

    let mut status_rx = handle.clone();
    loop {
        tokio::select! {
            sample = sub_drive.recv_async() => {
                let sample = sample?;
                on_drive_payload(&handle, &sample.payload().to_bytes())?;
            }
            sample = sub_control.recv_async() => {
                let sample = sample?;
                on_control_payload(&handle, &sample.payload().to_bytes())?;
            }
            status = status_rx.status_changed() => {
                let Ok(status) = status else {
                    info!("Control loop gone, closing transport");
                    return Ok(());
                };
                publish_status(&pub_status, &status).await;
            }
        }
    }
}

/// Decode a drive command and stage it; malformed payloads are logged and dropped
pub fn on_drive_payload(handle: &RuntimeHandle, payload: &[u8]) -> Result<(), Closed> {
    match serde_json::from_slice::<DriveCommand>(payload) {
        Ok(cmd) => handle.submit(cmd),
        Err(e) => {
            warn!("Failed to parse drive command: {}", e);
            Ok(())
        }
    }
}

pub fn on_control_payload(handle: &RuntimeHandle, payload: &[u8]) -> Result<(), Closed> {
    match serde_json::from_slice::<ControlRequest>(payload) {
        Ok(request) => {
            debug!("Control request: {:?}", request);
            handle.request(request)
        }
        Err(e) => {
            warn!("Failed to parse control request: {}", e);
            Ok(())
        }
    }
}

async fn publish_status(publisher: &zenoh::pubsub::Publisher<'_>, status: &StatusSnapshot) {
    match serde_json::to_string(status) {
        Ok(json) => {
            if let Err(e) = publisher.put(json).await {
                warn!("Failed to publish status: {}", e);
            }
        }
        Err(e) => warn!("Failed to encode status: {}", e),
    }
}
