// Application state management
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::audio::device::{AudioBackend, DeviceSelector};
use crate::audio::output::DeviceReport;
use crate::audio::player::{PlaybackEngine, PlaybackState};
use crate::error::{Error, Result};
use crate::events::BroadcastNotifier;
use crate::hotkey::dispatcher::{HotkeyBinding, HotkeyDispatcher, SharedBindings, ToggleTrigger};
use crate::settings::{Config, ConfigStore};

pub struct AppState {
    /// Command-side lock for the document. Never held across decode or device I/O.
    pub config: Mutex<Config>,
    pub store: ConfigStore,
    pub engine: PlaybackEngine,
    pub bindings: SharedBindings,
    pub notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    pub fn new(store: ConfigStore, backend: Arc<dyn AudioBackend>) -> Self {
        let config = store.load();
        Self::with_config(config, store, backend)
    }

    pub fn with_config(config: Config, store: ConfigStore, backend: Arc<dyn AudioBackend>) -> Self {
        let notifier = Arc::new(BroadcastNotifier::default());
        let engine = PlaybackEngine::new(backend, notifier.clone(), config.volume);
        let bindings = Arc::new(RwLock::new(HotkeyBinding::from_clips(&config.audio_list)));

        Self {
            config: Mutex::new(config),
            store,
            engine,
            bindings,
            notifier,
        }
    }

    /// Open the devices named in the config.
    pub fn start_audio(&self) -> DeviceReport {
        let (main, aux) = {
            let config = self.config.lock();
            (config.main_device.clone(), config.aux_device.clone())
        };
        self.engine.configure_devices(
            &DeviceSelector::primary(&main),
            &DeviceSelector::auxiliary(&aux),
        )
    }

    /// Play or stop the clip with `id`.
    pub fn toggle_clip(&self, id: &str) -> Result<PlaybackState> {
        let path = {
            let config = self.config.lock();
            config
                .clip(id)
                .map(|clip| PathBuf::from(&clip.path))
                .ok_or_else(|| Error::ClipNotFound(id.to_string()))?
        };
        self.engine.toggle(id, &path)
    }

    /// Rebuild hotkey bindings after the clip list changed.
    pub fn refresh_bindings(&self, config: &Config) {
        let bindings = HotkeyBinding::from_clips(&config.audio_list);
        debug!(count = bindings.len(), "Hotkey bindings updated");
        *self.bindings.write() = bindings;
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        self.store.save(config)
    }

    /// Trigger used by the hotkey dispatcher. Each toggle runs on the blocking
    /// pool so the hook thread never waits on a decode.
    pub fn hotkey_trigger(self: &Arc<Self>, runtime: Handle) -> ToggleTrigger {
        let state = Arc::clone(self);
        Arc::new(move |clip_id: &str| {
            let state = Arc::clone(&state);
            let clip_id = clip_id.to_string();
            runtime.spawn_blocking(move || {
                if let Err(e) = state.toggle_clip(&clip_id) {
                    warn!(%clip_id, error = %e, "Hotkey toggle failed");
                }
            });
        })
    }

    pub fn hotkey_dispatcher(self: &Arc<Self>, runtime: Handle) -> HotkeyDispatcher {
        HotkeyDispatcher::new(Arc::clone(&self.bindings), self.hotkey_trigger(runtime))
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}
