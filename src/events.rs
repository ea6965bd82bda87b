// Notifications pushed to the host shell (playback and device status)

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::audio::device::Route;

/// Something the UI should hear about. Emitted fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    PlaybackStarted { clip_id: String },
    PlaybackStopped { clip_id: String },
    PlaybackError { clip_id: String, message: String },
    DeviceWarning { route: Route, message: String },
    DeviceError { route: Route, message: String },
}

impl EngineEvent {
    /// Event-bus name, e.g. `"playback-error"`.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::PlaybackStarted { .. } => "playback-started",
            EngineEvent::PlaybackStopped { .. } => "playback-stopped",
            EngineEvent::PlaybackError { .. } => "playback-error",
            EngineEvent::DeviceWarning { .. } => "device-warning",
            EngineEvent::DeviceError { .. } => "device-error",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: EngineEvent);
}

/// Fans events out to any number of subscribers (the host shell, tests).
/// Events are also logged, so nothing is lost when nobody listens.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: EngineEvent) {
        log_event(&event);
        // No receivers is fine
        let _ = self.tx.send(event);
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::PlaybackStarted { clip_id } => info!(%clip_id, "Playback started"),
        EngineEvent::PlaybackStopped { clip_id } => info!(%clip_id, "Playback stopped"),
        EngineEvent::PlaybackError { clip_id, message } => {
            error!(%clip_id, %message, "Playback failed")
        }
        EngineEvent::DeviceWarning { route, message } => warn!(%route, %message, "Device warning"),
        EngineEvent::DeviceError { route, message } => error!(%route, %message, "Device error"),
    }
}
