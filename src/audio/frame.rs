// Stereo frames, the shared decoded buffer, and the pull-based source trait
// every stage of the playback chain implements.

use std::sync::Arc;

/// One stereo frame: `[left, right]`.
pub type Frame = [f32; 2];

pub const SILENT_FRAME: Frame = [0.0, 0.0];

/// Immutable PCM held in memory at the file's native rate.
///
/// Shared through `Arc` by every cursor reading it; never mutated once built,
/// so concurrent reads need no synchronization.
#[derive(Debug)]
pub struct DecodedBuffer {
    frames: Vec<Frame>,
    sample_rate: u32,
}

impl DecodedBuffer {
    pub fn new(frames: Vec<Frame>, sample_rate: u32) -> Self {
        Self { frames, sample_rate }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.sample_rate as f64
    }
}

/// A finite stream of stereo frames pulled by the consumer.
///
/// `fill` writes from the front of `out` and returns how many frames it wrote.
/// Returning fewer than `out.len()` means the stream has ended; later calls
/// keep returning 0.
pub trait FrameSource: Send {
    fn fill(&mut self, out: &mut [Frame]) -> usize;
}

/// Read position over a shared [`DecodedBuffer`].
pub struct BufferCursor {
    buffer: Arc<DecodedBuffer>,
    position: usize,
}

impl BufferCursor {
    pub fn new(buffer: Arc<DecodedBuffer>) -> Self {
        Self { buffer, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl FrameSource for BufferCursor {
    fn fill(&mut self, out: &mut [Frame]) -> usize {
        let remaining = &self.buffer.frames()[self.position..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Arc<DecodedBuffer> {
        let frames = (0..len).map(|i| [i as f32, -(i as f32)]).collect();
        Arc::new(DecodedBuffer::new(frames, 44100))
    }

    #[test]
    fn cursor_reads_in_order_then_ends() {
        let mut cursor = BufferCursor::new(ramp(5));
        let mut out = [SILENT_FRAME; 3];

        assert_eq!(cursor.fill(&mut out), 3);
        assert_eq!(out[2], [2.0, -2.0]);

        assert_eq!(cursor.fill(&mut out), 2);
        assert_eq!(out[..2], [[3.0, -3.0], [4.0, -4.0]]);

        assert_eq!(cursor.fill(&mut out), 0);
    }

    #[test]
    fn cursors_over_one_buffer_are_independent() {
        let buffer = ramp(4);
        let mut a = BufferCursor::new(Arc::clone(&buffer));
        let mut b = BufferCursor::new(Arc::clone(&buffer));
        let mut out = [SILENT_FRAME; 3];

        a.fill(&mut out);
        assert_eq!(a.position(), 3);
        assert_eq!(b.position(), 0);

        b.fill(&mut out[..1]);
        assert_eq!(out[0], [0.0, 0.0]);
        assert_eq!(Arc::strong_count(&buffer), 3);
    }

    #[test]
    fn duration_from_rate() {
        let buffer = DecodedBuffer::new(vec![SILENT_FRAME; 22050], 44100);
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
    }
}
