// Error types shared by the audio engine, hotkeys and clip library.

use thiserror::Error;

use crate::audio::device::Route;

#[derive(Error, Debug)]
pub enum Error {
    /// The file extension is not one of the two supported containers.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Corrupt data or a codec the container claims but cannot be decoded.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// A device was found but could not be opened or started.
    #[error("Failed to open {route} device: {reason}")]
    DeviceInit { route: Route, reason: String },

    /// A persisted device identifier is not in the live enumeration.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("File too large ({size_mb:.2}MB > 10MB)")]
    FileTooLarge { size_mb: f64 },

    #[error("Duration too long ({seconds:.1}s > 100s)")]
    DurationExceeded { seconds: f64 },

    #[error("Resampler error: {0}")]
    Resampler(String),

    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    /// Another clip already owns this key combination.
    #[error("Hotkey {hotkey} is already used by \"{owner}\"")]
    HotkeyInUse { hotkey: String, owner: String },

    #[error("Keyboard hook error: {0}")]
    Hook(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
