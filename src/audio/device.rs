// Output device enumeration and opening.
//
// The router talks to hardware only through `AudioBackend`, so the engine
// can run against a fake backend in tests. `CpalBackend` is the real one.

use std::fmt;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Fixed device wire format: interleaved 32-bit float.
pub const DEVICE_SAMPLE_RATE: u32 = 44100;
pub const DEVICE_CHANNELS: u16 = 2;

/// One of the two output destinations a clip is mixed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Primary,
    Auxiliary,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Primary => f.write_str("primary"),
            Route::Auxiliary => f.write_str("auxiliary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
}

/// A persisted device choice as stored in the config document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    Default,
    Disabled,
    Id(String),
}

impl DeviceSelector {
    /// Parse the primary route's selector. Empty or `"default"` picks the
    /// system default; the primary route cannot be disabled.
    pub fn primary(raw: &str) -> Self {
        match raw.trim() {
            "" | "default" => Self::Default,
            other => Self::Id(other.to_string()),
        }
    }

    /// Parse the auxiliary route's selector. Empty or `"none"` disables it.
    pub fn auxiliary(raw: &str) -> Self {
        match raw.trim() {
            "" | "none" => Self::Disabled,
            "default" => Self::Default,
            other => Self::Id(other.to_string()),
        }
    }
}

/// A resolved device to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    SystemDefault,
    Named(String),
}

/// Called on the platform audio thread with an interleaved stereo f32 buffer
/// that must be completely written.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// A live output stream. Dropping it stops and releases the device.
pub trait OutputHandle: Send {
    fn device_name(&self) -> &str;
}

pub trait AudioBackend: Send + Sync {
    /// Playback devices currently present.
    fn output_devices(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Name of the system default playback device, if any.
    fn default_device_name(&self) -> Option<String>;

    /// Open `target` with the fixed wire format and start pulling from `render`.
    fn open_output(
        &self,
        route: Route,
        target: &DeviceTarget,
        render: RenderCallback,
    ) -> Result<Box<dyn OutputHandle>>;
}

/// cpal-backed devices on the platform's default host.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn output_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let host = cpal::default_host();
        let devices = host.output_devices().map_err(|e| Error::DeviceInit {
            route: Route::Primary,
            reason: format!("failed to enumerate devices: {}", e),
        })?;

        Ok(devices
            .filter_map(|device| device.name().ok())
            .map(|name| DeviceDescriptor {
                id: name.clone(),
                name,
            })
            .collect())
    }

    fn default_device_name(&self) -> Option<String> {
        cpal::default_host()
            .default_output_device()
            .and_then(|d| d.name().ok())
    }

    fn open_output(
        &self,
        route: Route,
        target: &DeviceTarget,
        render: RenderCallback,
    ) -> Result<Box<dyn OutputHandle>> {
        // cpal streams are not Send, so each one lives on its own thread
        // until the handle asks it to stop.
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<String>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let target = target.clone();

        let thread = thread::Builder::new()
            .name(format!("{}-output", route))
            .spawn(move || {
                let stream = match build_stream(route, &target, render) {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Returns on an explicit stop or when the handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        match ready_rx.recv() {
            Ok(Ok(name)) => {
                info!(%route, device = %name, "Output device started");
                Ok(Box::new(CpalOutput {
                    name,
                    stop: Some(stop_tx),
                    thread: Some(thread),
                }))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::DeviceInit {
                    route,
                    reason: "output thread exited before the stream started".to_string(),
                })
            }
        }
    }
}

fn build_stream(
    route: Route,
    target: &DeviceTarget,
    mut render: RenderCallback,
) -> Result<(cpal::Stream, String)> {
    let init_err = |reason: String| Error::DeviceInit { route, reason };
    let host = cpal::default_host();

    let device = match target {
        DeviceTarget::SystemDefault => host
            .default_output_device()
            .ok_or_else(|| init_err("no default output device".to_string()))?,
        DeviceTarget::Named(wanted) => host
            .output_devices()
            .map_err(|e| init_err(format!("failed to enumerate devices: {}", e)))?
            .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
            .ok_or_else(|| Error::DeviceNotFound(wanted.clone()))?,
    };
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let config = StreamConfig {
        channels: DEVICE_CHANNELS,
        sample_rate: SampleRate(DEVICE_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data),
            move |err| {
                error!(%route, error = %err, "Audio output stream error");
            },
            None,
        )
        .map_err(|e| init_err(format!("failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| init_err(format!("failed to start stream: {}", e)))?;

    debug!(%route, device = %name, "Output stream playing");
    Ok((stream, name))
}

struct CpalOutput {
    name: String,
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputHandle for CpalOutput {
    fn device_name(&self) -> &str {
        &self.name
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        debug!(device = %self.name, "Output device released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_selector() {
        assert_eq!(DeviceSelector::primary(""), DeviceSelector::Default);
        assert_eq!(DeviceSelector::primary("default"), DeviceSelector::Default);
        assert_eq!(
            DeviceSelector::primary("USB Headset"),
            DeviceSelector::Id("USB Headset".to_string())
        );
    }

    #[test]
    fn auxiliary_selector() {
        assert_eq!(DeviceSelector::auxiliary(""), DeviceSelector::Disabled);
        assert_eq!(DeviceSelector::auxiliary("none"), DeviceSelector::Disabled);
        assert_eq!(DeviceSelector::auxiliary("default"), DeviceSelector::Default);
        assert_eq!(
            DeviceSelector::auxiliary("CABLE Input"),
            DeviceSelector::Id("CABLE Input".to_string())
        );
    }

    #[test]
    fn route_display() {
        assert_eq!(Route::Primary.to_string(), "primary");
        assert_eq!(
            serde_json::to_string(&Route::Auxiliary).unwrap(),
            "\"auxiliary\""
        );
    }
}
