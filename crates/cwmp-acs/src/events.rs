//! Device lifecycle notifications.
//!
//! The engine announces registrations and updates through
//! [`DeviceNotifier`]. Delivery is best effort: a failed notification is
//! logged and never affects the CWMP exchange.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::storage::Device;

/// Capacity of the in-process event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEventKind {
    /// First Inform from a serial number.
    Registered,
    /// Any later Inform.
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEvent {
    pub kind: DeviceEventKind,
    pub device: Device,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no subscribers")]
    NoSubscribers,
}

pub trait DeviceNotifier: Send + Sync {
    fn notify(&self, event: DeviceEvent) -> Result<(), NotifyError>;
}

/// Fan-out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<DeviceEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceNotifier for BroadcastNotifier {
    fn notify(&self, event: DeviceEvent) -> Result<(), NotifyError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers)
    }
}

/// Log every event until the channel closes; returns how many were seen.
///
/// The binary runs this so device changes show up in the server log even
/// with no other subscriber attached.
pub async fn log_events(mut rx: broadcast::Receiver<DeviceEvent>) -> u64 {
    let mut seen = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                seen += 1;
                info!(
                    kind = ?event.kind,
                    serial = %event.device.serial_number,
                    device_id = %event.device.id,
                    "Device event"
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Device event log lagged, skipped events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    seen
}
