// Audio decoder using Symphonia
// Decodes a whole clip into an in-memory stereo buffer at its native rate

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::frame::{DecodedBuffer, Frame};
use crate::error::{Error, Result};

/// The two containers a clip may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp3,
    Wav,
}

impl ContainerFormat {
    /// Pick the container from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "" => Err(Error::UnsupportedFormat("(no extension)".to_string())),
            other => Err(Error::UnsupportedFormat(format!(".{}", other))),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

/// Decode `path` completely. The result carries its native sample rate.
pub fn decode(path: &Path) -> Result<DecodedBuffer> {
    let mut decoder = AudioDecoder::open(path)?;
    let mut frames = Vec::new();

    while let Some(chunk) = decoder.decode_next()? {
        frames.extend_from_slice(&chunk);
    }

    debug!(
        path = %path.display(),
        frames = frames.len(),
        sample_rate = decoder.sample_rate(),
        "Decoded clip"
    );
    Ok(DecodedBuffer::new(frames, decoder.sample_rate()))
}

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl AudioDecoder {
    /// Open an audio file and prepare for decoding
    pub fn open(path: &Path) -> Result<Self> {
        let container = ContainerFormat::from_path(path)?;
        let file = File::open(path)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(container.extension());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("failed to probe file format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("no audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("unknown sample rate".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("failed to create decoder: {}", e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            sample_buf: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode the next packet into stereo frames.
    /// Returns None when end of stream is reached
    pub fn decode_next(&mut self) -> Result<Option<Vec<Frame>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // A damaged frame is dropped, the rest of the clip still plays
                    warn!(error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(Error::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            if channels == 0 || decoded.frames() == 0 {
                continue;
            }

            let capacity = decoded.capacity();
            let too_small = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < capacity * channels);
            if too_small {
                self.sample_buf = Some(SampleBuffer::<f32>::new(capacity as u64, spec));
            }

            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                return Ok(Some(to_stereo(buf.samples(), channels)));
            }
        }
    }
}

/// Fold interleaved samples into stereo frames.
/// Mono is duplicated, anything past the second channel is dropped.
fn to_stereo(samples: &[f32], channels: usize) -> Vec<Frame> {
    samples
        .chunks_exact(channels)
        .map(|chunk| {
            let left = chunk[0];
            let right = chunk.get(1).copied().unwrap_or(left);
            [left, right]
        })
        .collect()
}
