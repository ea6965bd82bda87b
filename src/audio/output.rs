// Device router: the two output bindings and their real-time render callbacks.
//
// Two independent locks are in play. Each route's slot (`RouteSlots`) holds the
// stream its callback pulls from; the callback only locks it long enough to
// clone the `Arc`. Device handles live behind a separate command-side lock
// that is never held across device open/close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::device::{
    AudioBackend, DeviceDescriptor, DeviceSelector, DeviceTarget, OutputHandle, RenderCallback,
    Route, DEVICE_CHANNELS,
};
use super::frame::{Frame, FrameSource, SILENT_FRAME};
use super::volume::VolumeStage;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, Notifier};

/// Frames converted per inner step of the callback. Larger hardware buffers
/// are rendered in several steps so the scratch space never grows.
const SCRATCH_FRAMES: usize = 1024;

/// One route's half of a playback session.
pub struct RouteStream {
    generation: u64,
    source: Mutex<VolumeStage>,
}

impl RouteStream {
    pub fn new(generation: u64, source: VolumeStage) -> Self {
        Self {
            generation,
            source: Mutex::new(source),
        }
    }
}

/// Both streams of a session, ready to be bound.
pub struct SessionStreams {
    pub generation: u64,
    pub primary: VolumeStage,
    pub auxiliary: VolumeStage,
}

/// Per-route stream pointers read by the audio callbacks.
pub struct RouteSlots {
    primary: Mutex<Option<Arc<RouteStream>>>,
    auxiliary: Mutex<Option<Arc<RouteStream>>>,
    /// Generation of the newest session whose primary stream ran out.
    finished_generation: AtomicU64,
    /// Streams taken out of a slot. Freed by the command side once no
    /// callback holds them, never on the audio thread.
    retired: Mutex<Vec<Arc<RouteStream>>>,
}

impl RouteSlots {
    fn new() -> Self {
        Self {
            primary: Mutex::new(None),
            auxiliary: Mutex::new(None),
            finished_generation: AtomicU64::new(0),
            retired: Mutex::new(Vec::new()),
        }
    }

    fn slot(&self, route: Route) -> &Mutex<Option<Arc<RouteStream>>> {
        match route {
            Route::Primary => &self.primary,
            Route::Auxiliary => &self.auxiliary,
        }
    }

    pub fn finished_generation(&self) -> u64 {
        self.finished_generation.load(Ordering::Acquire)
    }

    /// Fill one hardware buffer of interleaved stereo f32.
    ///
    /// Never blocks on the command path: the slot lock is held only to clone
    /// the current stream pointer.
    pub fn render(&self, route: Route, out: &mut [f32], scratch: &mut [Frame]) {
        let stream = self.slot(route).lock().clone();
        let Some(stream) = stream else {
            out.fill(0.0);
            return;
        };

        let channels = DEVICE_CHANNELS as usize;
        let step = scratch.len() * channels;
        let mut ended = false;
        {
            let mut source = stream.source.lock();
            for chunk in out.chunks_mut(step) {
                if ended {
                    chunk.fill(0.0);
                    continue;
                }
                let frames = chunk.len() / channels;
                let n = source.fill(&mut scratch[..frames]);
                for (dst, frame) in chunk.chunks_exact_mut(channels).zip(&scratch[..n]) {
                    dst[0] = frame[0];
                    dst[1] = frame[1];
                }
                chunk[n * channels..].fill(0.0);
                if n < frames {
                    ended = true;
                }
            }
        }

        if ended {
            self.finish(route, &stream);
        }
    }

    /// Clear `route` if it still points at `stream`. A newer session bound in
    /// the meantime is left alone.
    fn finish(&self, route: Route, stream: &Arc<RouteStream>) {
        let cleared = {
            let mut slot = self.slot(route).lock();
            match slot.as_ref() {
                Some(current) if Arc::ptr_eq(current, stream) => slot.take(),
                _ => None,
            }
        };

        if let Some(cleared) = cleared {
            if route == Route::Primary {
                self.finished_generation
                    .fetch_max(stream.generation, Ordering::AcqRel);
            }
            debug!(%route, generation = stream.generation, "Route reached end of stream");
            self.retired.lock().push(cleared);
        }
    }

    fn install(&self, primary: Option<Arc<RouteStream>>, auxiliary: Option<Arc<RouteStream>>) {
        // Both slots swap under their locks together so no callback ever sees
        // one route on the new session and the other on the old one.
        let (old_primary, old_aux) = {
            let mut p = self.primary.lock();
            let mut a = self.auxiliary.lock();
            (
                std::mem::replace(&mut *p, primary),
                std::mem::replace(&mut *a, auxiliary),
            )
        };

        // A callback may still be mid-tick on an old stream. Keep it until
        // that clone is gone so the last drop lands here.
        let freed: Vec<Arc<RouteStream>> = {
            let mut retired = self.retired.lock();
            retired.extend(old_primary);
            retired.extend(old_aux);
            let (busy, idle): (Vec<_>, Vec<_>) = std::mem::take(&mut *retired)
                .into_iter()
                .partition(|stream| Arc::strong_count(stream) > 1);
            *retired = busy;
            idle
        };
        // Buffers are released outside the lock the callback also takes.
        drop(freed);
    }

    pub fn is_bound(&self, route: Route) -> bool {
        self.slot(route).lock().is_some()
    }
}

/// How a route ended up after (re)configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteStatus {
    Active { device: String },
    /// The requested device was missing; playing on the system default.
    FellBack { requested: String, device: String },
    Disabled,
    Failed { reason: String },
}

impl RouteStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, RouteStatus::Active { .. } | RouteStatus::FellBack { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub primary: RouteStatus,
    pub auxiliary: RouteStatus,
}

impl Default for DeviceReport {
    fn default() -> Self {
        Self {
            primary: RouteStatus::Disabled,
            auxiliary: RouteStatus::Disabled,
        }
    }
}

#[derive(Default)]
struct DeviceHandles {
    primary: Option<Box<dyn OutputHandle>>,
    auxiliary: Option<Box<dyn OutputHandle>>,
    report: DeviceReport,
}

pub struct DeviceRouter {
    backend: Arc<dyn AudioBackend>,
    slots: Arc<RouteSlots>,
    handles: Mutex<DeviceHandles>,
    /// Serializes whole reconfigurations; device I/O happens under this one only.
    reconfigure: Mutex<()>,
    notifier: Arc<dyn Notifier>,
}

impl DeviceRouter {
    pub fn new(backend: Arc<dyn AudioBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            slots: Arc::new(RouteSlots::new()),
            handles: Mutex::new(DeviceHandles::default()),
            reconfigure: Mutex::new(()),
            notifier,
        }
    }

    pub fn slots(&self) -> &Arc<RouteSlots> {
        &self.slots
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        self.backend.output_devices()
    }

    /// Status of each route as of the last configuration.
    pub fn report(&self) -> DeviceReport {
        self.handles.lock().report.clone()
    }

    /// Stop the current devices and open the ones named by the selectors.
    ///
    /// Whatever is bound is unbound first. Failures are absorbed per route:
    /// the returned report says what each route ended up doing.
    pub fn configure(&self, primary: &DeviceSelector, auxiliary: &DeviceSelector) -> DeviceReport {
        let _gate = self.reconfigure.lock();

        self.unbind();
        self.close_devices();

        let available = match self.backend.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Device enumeration failed");
                Vec::new()
            }
        };

        let (primary_handle, primary_status) = self.open_primary(primary, &available);
        let primary_device = primary_handle.as_ref().map(|h| h.device_name().to_string());
        let (aux_handle, aux_status) =
            self.open_auxiliary(auxiliary, &available, primary_device.as_deref());

        let report = DeviceReport {
            primary: primary_status,
            auxiliary: aux_status,
        };
        {
            let mut handles = self.handles.lock();
            handles.primary = primary_handle;
            handles.auxiliary = aux_handle;
            handles.report = report.clone();
        }

        info!(primary = ?report.primary, auxiliary = ?report.auxiliary, "Audio devices configured");
        report
    }

    /// Release both devices. Playback streams stay bound but nothing pulls them.
    pub fn close_devices(&self) {
        let (old_primary, old_aux) = {
            let mut handles = self.handles.lock();
            handles.report = DeviceReport::default();
            (handles.primary.take(), handles.auxiliary.take())
        };
        // Driver shutdown can be slow; neither lock is held here.
        drop(old_primary);
        drop(old_aux);
    }

    pub fn bind_session(&self, session: SessionStreams) {
        let primary = Arc::new(RouteStream::new(session.generation, session.primary));
        let auxiliary = Arc::new(RouteStream::new(session.generation, session.auxiliary));
        self.slots.install(Some(primary), Some(auxiliary));
        debug!(generation = session.generation, "Session bound");
    }

    pub fn unbind(&self) {
        self.slots.install(None, None);
    }

    fn open_primary(
        &self,
        selector: &DeviceSelector,
        available: &[DeviceDescriptor],
    ) -> (Option<Box<dyn OutputHandle>>, RouteStatus) {
        let route = Route::Primary;
        let (target, requested) = match selector {
            DeviceSelector::Id(id) if available.iter().any(|d| &d.id == id) => {
                (DeviceTarget::Named(id.clone()), None)
            }
            DeviceSelector::Id(id) => {
                self.warn_device(route, format!("Device {} not found, falling back to default", id));
                (DeviceTarget::SystemDefault, Some(id.clone()))
            }
            // The primary route always plays somewhere.
            DeviceSelector::Default | DeviceSelector::Disabled => (DeviceTarget::SystemDefault, None),
        };

        match self.open(route, &target) {
            Ok(handle) => {
                let device = handle.device_name().to_string();
                let status = match requested {
                    Some(requested) => RouteStatus::FellBack { requested, device },
                    None => RouteStatus::Active { device },
                };
                (Some(handle), status)
            }
            Err(status) => (None, status),
        }
    }

    fn open_auxiliary(
        &self,
        selector: &DeviceSelector,
        available: &[DeviceDescriptor],
        primary_device: Option<&str>,
    ) -> (Option<Box<dyn OutputHandle>>, RouteStatus) {
        let route = Route::Auxiliary;
        let target = match selector {
            DeviceSelector::Disabled => return (None, RouteStatus::Disabled),
            DeviceSelector::Default => DeviceTarget::SystemDefault,
            DeviceSelector::Id(id) if available.iter().any(|d| &d.id == id) => {
                DeviceTarget::Named(id.clone())
            }
            DeviceSelector::Id(id) => {
                self.warn_device(route, format!("Device {} not found, route disabled", id));
                return (None, RouteStatus::Disabled);
            }
        };

        let resolved = match &target {
            DeviceTarget::Named(name) => Some(name.clone()),
            DeviceTarget::SystemDefault => self.backend.default_device_name(),
        };
        if let (Some(resolved), Some(primary)) = (resolved.as_deref(), primary_device) {
            if resolved == primary {
                self.warn_device(
                    route,
                    format!("Device {} is already the primary output, route disabled", resolved),
                );
                return (None, RouteStatus::Disabled);
            }
        }

        match self.open(route, &target) {
            Ok(handle) => {
                let device = handle.device_name().to_string();
                (Some(handle), RouteStatus::Active { device })
            }
            Err(status) => (None, status),
        }
    }

    fn open(
        &self,
        route: Route,
        target: &DeviceTarget,
    ) -> std::result::Result<Box<dyn OutputHandle>, RouteStatus> {
        let slots = Arc::clone(&self.slots);
        let mut scratch = vec![SILENT_FRAME; SCRATCH_FRAMES];
        let render: RenderCallback =
            Box::new(move |out: &mut [f32]| slots.render(route, out, &mut scratch));

        self.backend.open_output(route, target, render).map_err(|e| {
            let reason = match e {
                Error::DeviceInit { reason, .. } => reason,
                other => other.to_string(),
            };
            error!(%route, %reason, "Failed to open output device");
            self.notifier.notify(EngineEvent::DeviceError {
                route,
                message: reason.clone(),
            });
            RouteStatus::Failed { reason }
        })
    }

    fn warn_device(&self, route: Route, message: String) {
        self.notifier
            .notify(EngineEvent::DeviceWarning { route, message });
    }
}

impl Drop for DeviceRouter {
    fn drop(&mut self) {
        self.unbind();
        self.close_devices();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::{BufferCursor, DecodedBuffer};
    use crate::audio::volume::GainControl;

    fn stage(frames: Vec<Frame>) -> VolumeStage {
        let buffer = Arc::new(DecodedBuffer::new(frames, 44100));
        VolumeStage::new(
            Box::new(BufferCursor::new(buffer)),
            Arc::new(GainControl::default()),
        )
    }

    fn bind(slots: &RouteSlots, generation: u64, frames: Vec<Frame>) {
        slots.install(
            Some(Arc::new(RouteStream::new(generation, stage(frames.clone())))),
            Some(Arc::new(RouteStream::new(generation, stage(frames)))),
        );
    }

    #[test]
    fn empty_slot_renders_silence() {
        let slots = RouteSlots::new();
        let mut out = vec![1.0f32; 16];
        let mut scratch = vec![SILENT_FRAME; 4];
        slots.render(Route::Primary, &mut out, &mut scratch);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn render_interleaves_and_zero_fills_tail() {
        let slots = RouteSlots::new();
        bind(&slots, 1, vec![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]);

        // Scratch smaller than the buffer exercises the stepped path.
        let mut scratch = vec![SILENT_FRAME; 2];
        let mut out = vec![9.0f32; 10];
        slots.render(Route::Primary, &mut out, &mut scratch);

        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.0, 0.0, 0.0, 0.0]);
        assert!(!slots.is_bound(Route::Primary));
        assert_eq!(slots.finished_generation(), 1);
    }

    #[test]
    fn auxiliary_end_leaves_primary_and_generation() {
        let slots = RouteSlots::new();
        bind(&slots, 3, vec![[0.5, 0.5]; 2]);

        let mut scratch = vec![SILENT_FRAME; 8];
        let mut out = vec![0.0f32; 8];
        slots.render(Route::Auxiliary, &mut out, &mut scratch);

        assert!(!slots.is_bound(Route::Auxiliary));
        assert!(slots.is_bound(Route::Primary));
        assert_eq!(slots.finished_generation(), 0);
    }

    #[test]
    fn swapped_out_stream_is_freed_off_the_audio_thread() {
        let slots = RouteSlots::new();
        bind(&slots, 1, vec![[0.5, 0.5]; 100]);

        // What the callback holds while a tick is in flight.
        let in_flight = slots.primary.lock().clone().unwrap();
        bind(&slots, 2, vec![[0.5, 0.5]; 100]);
        assert_eq!(slots.retired.lock().len(), 1);
        assert_eq!(Arc::strong_count(&in_flight), 2);

        drop(in_flight);
        slots.install(None, None);
        assert!(slots.retired.lock().is_empty());
    }

    #[test]
    fn finished_stream_waits_for_the_command_side() {
        let slots = RouteSlots::new();
        bind(&slots, 1, vec![[0.5, 0.5]; 2]);

        let mut scratch = vec![SILENT_FRAME; 8];
        let mut out = vec![0.0f32; 16];
        slots.render(Route::Primary, &mut out, &mut scratch);
        assert!(!slots.is_bound(Route::Primary));
        assert_eq!(slots.retired.lock().len(), 1);

        slots.install(None, None);
        assert!(slots.retired.lock().is_empty());
    }

    #[test]
    fn stale_finish_does_not_clear_newer_session() {
        let slots = RouteSlots::new();
        bind(&slots, 1, vec![[0.5, 0.5]; 2]);
        let old = slots.primary.lock().clone().unwrap();

        bind(&slots, 2, vec![[0.5, 0.5]; 100]);
        slots.finish(Route::Primary, &old);

        assert!(slots.is_bound(Route::Primary));
        assert_eq!(slots.finished_generation(), 0);
    }
}
