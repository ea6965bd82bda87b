// Shared fixtures: an in-memory audio backend and WAV writers
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use daitoue_lib::audio::device::{
    AudioBackend, DeviceDescriptor, DeviceTarget, OutputHandle, RenderCallback, Route,
};
use daitoue_lib::settings::{Config, ConfigStore};
use daitoue_lib::state::AppState;
use daitoue_lib::{Error, Result};

pub const SPEAKERS: &str = "Speakers";
pub const CABLE: &str = "CABLE Input";

struct OpenStream {
    route: Route,
    device: String,
    render: Arc<Mutex<RenderCallback>>,
    alive: Arc<AtomicBool>,
}

/// Devices that exist only in memory. Tests pull the render callbacks by hand
/// in place of the platform audio thread.
pub struct FakeBackend {
    devices: Vec<String>,
    default_device: String,
    failing: Mutex<Vec<String>>,
    streams: Mutex<Vec<OpenStream>>,
}

impl FakeBackend {
    pub fn new(devices: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            devices: devices.iter().map(|d| d.to_string()).collect(),
            default_device: devices.first().map(|d| d.to_string()).unwrap_or_default(),
            failing: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_device(&self, name: &str) {
        self.failing.lock().push(name.to_string());
    }

    /// Device currently open on `route`, if any.
    pub fn open_device(&self, route: Route) -> Option<String> {
        self.streams
            .lock()
            .iter()
            .rev()
            .find(|s| s.route == route && s.alive.load(Ordering::SeqCst))
            .map(|s| s.device.clone())
    }

    pub fn live_streams(&self) -> usize {
        self.streams
            .lock()
            .iter()
            .filter(|s| s.alive.load(Ordering::SeqCst))
            .count()
    }

    /// Run one callback tick of `frames` frames on `route`'s live device.
    pub fn pull(&self, route: Route, frames: usize) -> Option<Vec<f32>> {
        let render = self
            .streams
            .lock()
            .iter()
            .rev()
            .find(|s| s.route == route && s.alive.load(Ordering::SeqCst))
            .map(|s| Arc::clone(&s.render))?;

        let mut out = vec![f32::NAN; frames * 2];
        let mut callback = render.lock();
        (*callback)(&mut out);
        Some(out)
    }
}

struct FakeHandle {
    device: String,
    alive: Arc<AtomicBool>,
}

impl OutputHandle for FakeHandle {
    fn device_name(&self) -> &str {
        &self.device
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl AudioBackend for FakeBackend {
    fn output_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(self
            .devices
            .iter()
            .map(|name| DeviceDescriptor {
                id: name.clone(),
                name: name.clone(),
            })
            .collect())
    }

    fn default_device_name(&self) -> Option<String> {
        Some(self.default_device.clone())
    }

    fn open_output(
        &self,
        route: Route,
        target: &DeviceTarget,
        render: RenderCallback,
    ) -> Result<Box<dyn OutputHandle>> {
        let device = match target {
            DeviceTarget::SystemDefault => self.default_device.clone(),
            DeviceTarget::Named(name) => name.clone(),
        };
        if self.failing.lock().contains(&device) {
            return Err(Error::DeviceInit {
                route,
                reason: format!("{} is busy", device),
            });
        }

        let alive = Arc::new(AtomicBool::new(true));
        self.streams.lock().push(OpenStream {
            route,
            device: device.clone(),
            render: Arc::new(Mutex::new(render)),
            alive: Arc::clone(&alive),
        });
        Ok(Box::new(FakeHandle { device, alive }))
    }
}

/// 16-bit stereo WAV holding a constant `level` (exact in f32 for powers of two).
pub fn write_constant_wav(path: &Path, rate: u32, frames: u32, level: f32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let value = (level * 32768.0) as i16;
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        writer.write_sample(value).unwrap();
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub backend: Arc<FakeBackend>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        Self::with_backend(config, FakeBackend::new(&[SPEAKERS, CABLE]))
    }

    pub fn with_backend(config: Config, backend: Arc<FakeBackend>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(
            dir.path().join("cfg").join("config.json"),
            dir.path().join("legacy.json"),
        );
        let state = Arc::new(AppState::with_config(config, store, backend.clone()));
        Self {
            dir,
            backend,
            state,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a WAV fixture and import it, returning the new clip id.
    pub fn add_clip(&self, name: &str, frames: u32, level: f32) -> String {
        let path = self.path(name);
        write_constant_wav(&path, 44100, frames, level);
        let summary = daitoue_lib::commands::import_audio_files(
            &self.state,
            vec![path.to_string_lossy().to_string()],
        )
        .unwrap();
        assert_eq!(summary, "OK");
        self.state
            .config
            .lock()
            .audio_list
            .last()
            .map(|c| c.id.clone())
            .unwrap()
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
