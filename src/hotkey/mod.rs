// Global hotkeys: token grammar, key-state matching, hook plumbing

pub mod dispatcher;
pub mod hook;
pub mod keys;

pub use dispatcher::{HotkeyBinding, HotkeyDispatcher, SharedBindings, ToggleTrigger};
pub use hook::{CancelToken, HotkeyListener, KeyEvent, KeyboardHook, SyntheticHook};
pub use keys::{normalize_hotkey, Hotkey};
