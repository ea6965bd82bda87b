// Gain applied to each route's stream.
//
// Volume is stored in the log2 domain ("how many doublings" relative to
// unity), so a value of `-1.0` halves the amplitude. The gain lives in
// atomics shared between the command thread and the audio callback, which
// lets the slider move while a clip is playing without rebuilding the chain.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::frame::{Frame, FrameSource, SILENT_FRAME};

/// Log2 volume used for a hard-muted route.
pub const SILENT_VOLUME: f64 = -100.0;

/// Map a 0..=100 slider percentage to a log2 volume.
///
/// `percent <= 0` yields [`SILENT_VOLUME`], `percent >= 100` yields unity (0).
/// Callers are expected to stay within 0..=100.
pub fn calculate_volume(percent: f64) -> f64 {
    if percent <= 0.0 {
        return SILENT_VOLUME;
    }
    if percent >= 100.0 {
        return 0.0;
    }
    (percent / 100.0).log2()
}

/// Live gain setting for one route.
#[derive(Debug)]
pub struct GainControl {
    volume_bits: AtomicU64,
    silent: AtomicBool,
}

impl GainControl {
    pub fn new(percent: f64) -> Self {
        let control = Self {
            volume_bits: AtomicU64::new(0f64.to_bits()),
            silent: AtomicBool::new(false),
        };
        control.set_percent(percent);
        control
    }

    pub fn set_percent(&self, percent: f64) {
        self.volume_bits
            .store(calculate_volume(percent).to_bits(), Ordering::Relaxed);
        self.silent.store(percent <= 0.0, Ordering::Relaxed);
    }

    /// Current log2 volume.
    pub fn volume(&self) -> f64 {
        f64::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::Relaxed)
    }

    /// Linear amplitude multiplier, `2^volume`.
    pub fn amplitude(&self) -> f32 {
        2f64.powf(self.volume()) as f32
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Wraps a stream and scales every frame it yields by the route's gain.
pub struct VolumeStage {
    inner: Box<dyn FrameSource>,
    gain: Arc<GainControl>,
}

impl VolumeStage {
    pub fn new(inner: Box<dyn FrameSource>, gain: Arc<GainControl>) -> Self {
        Self { inner, gain }
    }

    pub fn gain(&self) -> &GainControl {
        &self.gain
    }
}

impl FrameSource for VolumeStage {
    fn fill(&mut self, out: &mut [Frame]) -> usize {
        let n = self.inner.fill(out);

        if self.gain.is_silent() {
            // Skip the multiply so tails never decay into denormals
            out[..n].fill(SILENT_FRAME);
            return n;
        }

        let amp = self.gain.amplitude();
        if amp != 1.0 {
            for frame in &mut out[..n] {
                frame[0] *= amp;
                frame[1] *= amp;
            }
        }
        n
    }
}
