// Sample rate conversion to the fixed device rate.
//
// Each cursor owns its own rubato `FastFixedIn` with cubic (4-point)
// interpolation and works lazily: input is pulled from the shared decoded
// buffer one chunk at a time as the audio callback asks for frames. All
// scratch buffers are allocated when the cursor is built, so `fill` never
// allocates. Two cursors over the same buffer produce bit-identical output.

use std::sync::Arc;

use rubato::{FastFixedIn, PolynomialDegree, Resampler as _};
use tracing::warn;

use super::frame::{BufferCursor, DecodedBuffer, Frame, FrameSource};
use crate::error::{Error, Result};

/// Input frames handed to rubato per chunk.
const CHUNK_FRAMES: usize = 1024;

/// Build a fresh stream over `buffer` at `to_rate`, starting from frame 0.
///
/// When the rates already match this is a plain cursor over the buffer.
pub fn resample(buffer: Arc<DecodedBuffer>, to_rate: u32) -> Result<Box<dyn FrameSource>> {
    if buffer.sample_rate() == to_rate {
        return Ok(Box::new(BufferCursor::new(buffer)));
    }
    Ok(Box::new(ResampledCursor::new(buffer, to_rate)?))
}

pub struct ResampledCursor {
    buffer: Arc<DecodedBuffer>,
    resampler: FastFixedIn<f32>,
    input_pos: usize,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    output_len: usize,
    output_pos: usize,
    /// Leading frames of filter delay still to discard.
    delay_left: usize,
    /// Frames still owed to the consumer.
    remaining: usize,
}

impl ResampledCursor {
    pub fn new(buffer: Arc<DecodedBuffer>, to_rate: u32) -> Result<Self> {
        let from_rate = buffer.sample_rate();
        if from_rate == 0 || to_rate == 0 {
            return Err(Error::Resampler(format!(
                "invalid rate pair {} -> {}",
                from_rate, to_rate
            )));
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let resampler =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK_FRAMES, 2)
                .map_err(|e| Error::Resampler(e.to_string()))?;

        let input = vec![vec![0.0; resampler.input_frames_max()]; 2];
        let output = vec![vec![0.0; resampler.output_frames_max()]; 2];
        // The filter starts against zeroed history, so the first few frames
        // can overshoot slightly and the flushed tail decays toward silence.
        let delay_left = resampler.output_delay();
        let remaining = ((buffer.len() as u64 * to_rate as u64 + from_rate as u64 - 1)
            / from_rate as u64) as usize;

        Ok(Self {
            buffer,
            resampler,
            input_pos: 0,
            input,
            output,
            output_len: 0,
            output_pos: 0,
            delay_left,
            remaining,
        })
    }

    /// Run one rubato chunk. Returns false once nothing more can be produced.
    fn refill(&mut self) -> bool {
        let frames = self.buffer.frames();
        let wanted = self.resampler.input_frames_next();
        let start = self.input_pos.min(frames.len());
        let end = (start + wanted).min(frames.len());
        let n = end - start;

        for (i, [l, r]) in frames[start..end].iter().enumerate() {
            self.input[0][i] = *l;
            self.input[1][i] = *r;
        }

        let result = if n == wanted {
            self.resampler
                .process_into_buffer(&self.input, &mut self.output, None)
        } else if n > 0 {
            let partial: [&[f32]; 2] = [&self.input[0][..n], &self.input[1][..n]];
            self.resampler
                .process_partial_into_buffer(Some(&partial[..]), &mut self.output, None)
        } else {
            // Input exhausted: flush the filter tail.
            self.resampler
                .process_partial_into_buffer(None::<&[&[f32]]>, &mut self.output, None)
        };

        match result {
            Ok((_, produced)) => {
                self.input_pos = end;
                let skipped = self.delay_left.min(produced);
                self.delay_left -= skipped;
                self.output_pos = skipped;
                self.output_len = produced;
                produced > 0 || n > 0
            }
            Err(e) => {
                warn!(error = %e, "Resampler failed, ending stream");
                self.remaining = 0;
                false
            }
        }
    }
}

impl FrameSource for ResampledCursor {
    fn fill(&mut self, out: &mut [Frame]) -> usize {
        let mut written = 0;

        while written < out.len() && self.remaining > 0 {
            if self.output_pos >= self.output_len {
                if !self.refill() {
                    self.remaining = 0;
                    break;
                }
                continue;
            }

            let n = (self.output_len - self.output_pos)
                .min(out.len() - written)
                .min(self.remaining);
            let left = &self.output[0][self.output_pos..self.output_pos + n];
            let right = &self.output[1][self.output_pos..self.output_pos + n];
            for (frame, (l, r)) in out[written..written + n]
                .iter_mut()
                .zip(left.iter().zip(right))
            {
                *frame = [*l, *r];
            }

            self.output_pos += n;
            self.remaining -= n;
            written += n;
        }

        written
    }
}
