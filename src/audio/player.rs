// Playback engine
// At most one clip plays at a time; its decoded buffer feeds one stream per route.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use super::decoder;
use super::device::{AudioBackend, DeviceDescriptor, DeviceSelector, DEVICE_SAMPLE_RATE};
use super::frame::DecodedBuffer;
use super::output::{DeviceReport, DeviceRouter, SessionStreams};
use super::resampler::resample;
use super::volume::{GainControl, VolumeStage};
use crate::error::Result;
use crate::events::{EngineEvent, Notifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "clip_id", rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing(String),
}

/// Both route streams of a decoded clip, not yet bound to the router.
pub struct PreparedClip {
    primary: VolumeStage,
    auxiliary: VolumeStage,
}

struct ActiveClip {
    clip_id: String,
    generation: u64,
}

#[derive(Default)]
struct EngineState {
    playing: Option<ActiveClip>,
    next_generation: u64,
}

pub struct PlaybackEngine {
    router: DeviceRouter,
    state: Mutex<EngineState>,
    /// Bumped by every toggle and stop. A decode only installs its session if
    /// no newer request arrived while it ran.
    requests: AtomicU64,
    primary_gain: Arc<GainControl>,
    aux_gain: Arc<GainControl>,
    notifier: Arc<dyn Notifier>,
}

impl PlaybackEngine {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        notifier: Arc<dyn Notifier>,
        volume_percent: f64,
    ) -> Self {
        Self {
            router: DeviceRouter::new(backend, Arc::clone(&notifier)),
            state: Mutex::new(EngineState::default()),
            requests: AtomicU64::new(0),
            primary_gain: Arc::new(GainControl::new(volume_percent)),
            aux_gain: Arc::new(GainControl::new(volume_percent)),
            notifier,
        }
    }

    pub fn router(&self) -> &DeviceRouter {
        &self.router
    }

    /// Start `clip_id`, or stop it if it is the clip already playing.
    ///
    /// Decoding happens on the calling thread without holding any engine lock.
    /// On failure the previous session keeps playing and a `playback-error`
    /// event is emitted.
    pub fn toggle(&self, clip_id: &str, path: &Path) -> Result<PlaybackState> {
        if self.playing_id().as_deref() == Some(clip_id) {
            self.stop();
            return Ok(PlaybackState::Idle);
        }

        let ticket = self.next_request();
        let prepared = match self.prepare(path) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.notifier.notify(EngineEvent::PlaybackError {
                    clip_id: clip_id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        Ok(self.install(ticket, clip_id, prepared))
    }

    /// Reserve a request ticket for a decode about to start.
    pub fn next_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decode `path` and build the two route streams over one shared buffer.
    pub fn prepare(&self, path: &Path) -> Result<PreparedClip> {
        let buffer = Arc::new(decoder::decode(path)?);
        self.prepare_buffer(buffer)
    }

    pub fn prepare_buffer(&self, buffer: Arc<DecodedBuffer>) -> Result<PreparedClip> {
        let primary = resample(Arc::clone(&buffer), DEVICE_SAMPLE_RATE)?;
        let auxiliary = resample(buffer, DEVICE_SAMPLE_RATE)?;
        Ok(PreparedClip {
            primary: VolumeStage::new(primary, Arc::clone(&self.primary_gain)),
            auxiliary: VolumeStage::new(auxiliary, Arc::clone(&self.aux_gain)),
        })
    }

    /// Bind `prepared` as the new session unless `ticket` has been overtaken.
    pub fn install(&self, ticket: u64, clip_id: &str, prepared: PreparedClip) -> PlaybackState {
        let previous = {
            let mut state = self.state.lock();
            if self.requests.load(Ordering::Acquire) != ticket {
                debug!(%clip_id, ticket, "Discarding stale decode");
                return self.state_of(&state);
            }

            let previous = self.take_active(&mut state);
            state.next_generation += 1;
            let generation = state.next_generation;
            self.router.bind_session(SessionStreams {
                generation,
                primary: prepared.primary,
                auxiliary: prepared.auxiliary,
            });
            state.playing = Some(ActiveClip {
                clip_id: clip_id.to_string(),
                generation,
            });
            previous
        };

        if let Some(previous) = previous {
            self.notifier
                .notify(EngineEvent::PlaybackStopped { clip_id: previous });
        }
        self.notifier.notify(EngineEvent::PlaybackStarted {
            clip_id: clip_id.to_string(),
        });
        PlaybackState::Playing(clip_id.to_string())
    }

    /// Tear down the current session. Any decode still in flight is discarded.
    pub fn stop(&self) {
        self.next_request();
        let previous = {
            let mut state = self.state.lock();
            let previous = self.take_active(&mut state);
            self.router.unbind();
            previous
        };

        if let Some(clip_id) = previous {
            self.notifier.notify(EngineEvent::PlaybackStopped { clip_id });
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state_of(&self.state.lock())
    }

    /// Id of the clip whose primary route is still playing.
    pub fn playing_id(&self) -> Option<String> {
        match self.state() {
            PlaybackState::Playing(id) => Some(id),
            PlaybackState::Idle => None,
        }
    }

    /// Live volume for both routes, applied to a playing clip immediately.
    pub fn set_volume(&self, percent: f64) {
        self.primary_gain.set_percent(percent);
        self.aux_gain.set_percent(percent);
        debug!(percent, "Volume updated");
    }

    /// Stop playback, then reopen both output devices.
    pub fn configure_devices(
        &self,
        primary: &DeviceSelector,
        auxiliary: &DeviceSelector,
    ) -> DeviceReport {
        self.stop();
        self.router.configure(primary, auxiliary)
    }

    pub fn device_report(&self) -> DeviceReport {
        self.router.report()
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        self.router.list_devices()
    }

    /// Stop playback and release both devices.
    pub fn shutdown(&self) {
        self.stop();
        self.router.close_devices();
        info!("Playback engine shut down");
    }

    fn state_of(&self, state: &EngineState) -> PlaybackState {
        let finished = self.router.slots().finished_generation();
        match &state.playing {
            Some(active) if active.generation > finished => {
                PlaybackState::Playing(active.clip_id.clone())
            }
            _ => PlaybackState::Idle,
        }
    }

    /// Clear the active clip, returning its id if it was still audibly playing.
    fn take_active(&self, state: &mut EngineState) -> Option<String> {
        let finished = self.router.slots().finished_generation();
        state
            .playing
            .take()
            .filter(|active| active.generation > finished)
            .map(|active| active.clip_id)
    }
}
