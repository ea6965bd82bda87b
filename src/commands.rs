// Command surface for the host shell
// Every command takes the shared state and reports failures as strings.

use std::path::PathBuf;

use tracing::info;

use crate::audio::device::{DeviceDescriptor, DeviceSelector};
use crate::audio::output::DeviceReport;
use crate::audio::player::PlaybackState;
use crate::error::Error;
use crate::hotkey::keys::{normalize_hotkey, Hotkey};
use crate::library::clip::{self, Clip};
use crate::library::importer;
use crate::settings::Config;
use crate::state::AppState;

fn persist(state: &AppState, config: &Config) -> Result<(), String> {
    state
        .save(config)
        .map_err(|e| format!("Failed to save config: {}", e))
}

// ===== Clip Commands =====

pub fn get_audios(state: &AppState) -> Result<Vec<Clip>, String> {
    Ok(state.config.lock().audio_list.clone())
}

/// Import files and directories. Returns `"OK"` or one error line per
/// rejected file; accepted files are added either way.
pub fn import_audio_files(state: &AppState, paths: Vec<String>) -> Result<String, String> {
    let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
    let existing = state.config.lock().audio_list.len();

    // Probing decodes every file; the config lock is not held meanwhile.
    let result = importer::import_files(&paths, existing);

    if !result.added.is_empty() {
        let mut config = state.config.lock();
        config.audio_list.extend(result.added.iter().cloned());
        persist(state, &config)?;
        state.refresh_bindings(&config);
    }

    Ok(result.summary())
}

pub fn delete_audio(state: &AppState, id: String) -> Result<(), String> {
    let mut config = state.config.lock();
    config.audio_list.retain(|c| c.id != id);
    persist(state, &config)?;
    state.refresh_bindings(&config);
    Ok(())
}

pub fn update_audio_order(state: &AppState, ids: Vec<String>) -> Result<(), String> {
    let mut config = state.config.lock();
    let clips = std::mem::take(&mut config.audio_list);
    config.audio_list = clip::reorder(clips, &ids);
    persist(state, &config)?;
    // First-match-wins follows list order
    state.refresh_bindings(&config);
    Ok(())
}

/// Assign a hotkey to a clip. ESC clears it. Returns the stored hotkey.
pub fn update_hotkey(state: &AppState, id: String, hotkey: String) -> Result<String, String> {
    let hotkey = normalize_hotkey(&hotkey);
    let mut config = state.config.lock();

    if let Some(wanted) = Hotkey::parse(&hotkey) {
        let owner = config.audio_list.iter().find(|c| {
            c.id != id && Hotkey::parse(&c.hotkey).map_or(false, |h| h.same_keys(&wanted))
        });
        if let Some(owner) = owner {
            return Err(Error::HotkeyInUse {
                hotkey,
                owner: owner.name.clone(),
            }
            .to_string());
        }
    }

    let clip = config
        .clip_mut(&id)
        .ok_or_else(|| Error::ClipNotFound(id.clone()).to_string())?;
    clip.hotkey = hotkey.clone();

    persist(state, &config)?;
    state.refresh_bindings(&config);
    info!(%id, %hotkey, "Hotkey updated");
    Ok(hotkey)
}

pub fn play_audio_id(state: &AppState, id: String) -> Result<PlaybackState, String> {
    state
        .toggle_clip(&id)
        .map_err(|e| format!("Failed to play clip: {}", e))
}

pub fn stop_audio(state: &AppState) -> Result<(), String> {
    state.engine.stop();
    Ok(())
}

pub fn get_playback_state(state: &AppState) -> Result<PlaybackState, String> {
    Ok(state.engine.state())
}

// ===== Audio Device Commands =====

pub fn get_audio_devices(state: &AppState) -> Result<Vec<DeviceDescriptor>, String> {
    state
        .engine
        .list_devices()
        .map_err(|e| format!("Failed to list devices: {}", e))
}

/// Save device choice and volume. Devices restart only if a selector changed;
/// otherwise the new volume is applied to whatever is playing.
pub fn set_audio_settings(
    state: &AppState,
    main_device: String,
    aux_device: String,
    volume: f64,
) -> Result<DeviceReport, String> {
    let changed = {
        let mut config = state.config.lock();
        let changed = config.main_device != main_device || config.aux_device != aux_device;
        config.main_device = main_device.clone();
        config.aux_device = aux_device.clone();
        config.volume = volume;
        persist(state, &config)?;
        changed
    };

    state.engine.set_volume(volume);
    if changed {
        Ok(state.engine.configure_devices(
            &DeviceSelector::primary(&main_device),
            &DeviceSelector::auxiliary(&aux_device),
        ))
    } else {
        Ok(state.engine.device_report())
    }
}

/// Back to the system default output with no auxiliary route.
pub fn reset_audio(state: &AppState) -> Result<DeviceReport, String> {
    {
        let mut config = state.config.lock();
        config.main_device.clear();
        config.aux_device.clear();
        persist(state, &config)?;
    }
    Ok(state
        .engine
        .configure_devices(&DeviceSelector::Default, &DeviceSelector::Disabled))
}

// ===== UI Preference Commands =====

pub fn get_config(state: &AppState) -> Result<Config, String> {
    Ok(state.config.lock().clone())
}

pub fn save_settings(
    state: &AppState,
    close_action: String,
    dont_ask_again: bool,
) -> Result<(), String> {
    let mut config = state.config.lock();
    config.close_action = close_action;
    config.dont_ask_again = dont_ask_again;
    persist(state, &config)
}

pub fn save_sidebar_state(state: &AppState, collapsed: bool) -> Result<(), String> {
    let mut config = state.config.lock();
    config.sidebar_collapsed = collapsed;
    persist(state, &config)
}

/// Ignored unless both dimensions are positive.
pub fn save_window_size(state: &AppState, width: i32, height: i32) -> Result<(), String> {
    if width <= 0 || height <= 0 {
        return Ok(());
    }
    let mut config = state.config.lock();
    config.window_width = width;
    config.window_height = height;
    persist(state, &config)
}
