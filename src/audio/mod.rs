// Audio playback module
// Symphonia decodes, rubato resamples, cpal drives the two output devices

pub mod decoder;
pub mod device;
pub mod frame;
pub mod output;
pub mod player;
pub mod resampler;
pub mod volume;

pub use device::{AudioBackend, CpalBackend, DeviceDescriptor, DeviceSelector, Route};
pub use output::{DeviceReport, DeviceRouter, RouteStatus};
pub use player::{PlaybackEngine, PlaybackState};
pub use volume::calculate_volume;
