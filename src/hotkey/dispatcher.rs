// Key-state tracking and hotkey matching
// Runs on the hook thread; playback work is handed off, never done inline.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::hook::KeyEvent;
use super::keys::Hotkey;
use crate::library::clip::Clip;

#[derive(Debug, Clone, PartialEq)]
pub struct HotkeyBinding {
    pub clip_id: String,
    pub hotkey: Hotkey,
}

impl HotkeyBinding {
    /// Bindings for every clip with a hotkey, in clip-list order.
    pub fn from_clips(clips: &[Clip]) -> Vec<HotkeyBinding> {
        clips
            .iter()
            .filter_map(|clip| {
                Hotkey::parse(&clip.hotkey).map(|hotkey| HotkeyBinding {
                    clip_id: clip.id.clone(),
                    hotkey,
                })
            })
            .collect()
    }
}

/// Bindings shared between the command path (writer) and the hook thread.
pub type SharedBindings = Arc<RwLock<Vec<HotkeyBinding>>>;

/// Called with the clip id to toggle. Must return quickly.
pub type ToggleTrigger = Arc<dyn Fn(&str) + Send + Sync>;

pub struct HotkeyDispatcher {
    pressed: HashSet<u16>,
    bindings: SharedBindings,
    trigger: ToggleTrigger,
}

impl HotkeyDispatcher {
    pub fn new(bindings: SharedBindings, trigger: ToggleTrigger) -> Self {
        Self {
            pressed: HashSet::new(),
            bindings,
            trigger,
        }
    }

    pub fn handle(&mut self, event: KeyEvent) -> Option<String> {
        match event {
            KeyEvent::Down(code) => self.on_key_down(code),
            KeyEvent::Up(code) => {
                self.on_key_up(code);
                None
            }
        }
    }

    /// Record `code` as held and fire the first binding it completes.
    ///
    /// Auto-repeat of a key already down does nothing. Returns the clip id
    /// that was triggered, if any.
    pub fn on_key_down(&mut self, code: u16) -> Option<String> {
        if !self.pressed.insert(code) {
            return None;
        }
        trace!(code, "Key down");

        let clip_id = {
            let bindings = self.bindings.read();
            bindings
                .iter()
                .find(|b| b.hotkey.involves(code) && self.matches(b))
                .map(|b| b.clip_id.clone())
        }?;

        debug!(%clip_id, "Hotkey matched");
        (self.trigger)(&clip_id);
        Some(clip_id)
    }

    pub fn on_key_up(&mut self, code: u16) {
        self.pressed.remove(&code);
    }

    /// Every key of `binding` is currently held.
    pub fn matches(&self, binding: &HotkeyBinding) -> bool {
        binding.hotkey.is_pressed(&self.pressed)
    }
}
