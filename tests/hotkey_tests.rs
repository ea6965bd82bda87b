mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_until, Harness};
use daitoue_lib::audio::player::PlaybackState;
use daitoue_lib::commands;
use daitoue_lib::hotkey::hook::{HotkeyListener, KeyEvent, SyntheticHook};
use daitoue_lib::hotkey::keys::{VK_LCONTROL, VK_RSHIFT};
use daitoue_lib::settings::Config;

const KEY_A: u16 = 65;

#[test]
fn ctrl_shift_a_toggles_its_clip() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let h = Harness::new(Config::default());
    h.state.start_audio();
    let id = h.add_clip("airhorn.wav", 44100, 0.25);
    commands::update_hotkey(&h.state, id.clone(), "Ctrl+Shift+A".to_string()).unwrap();

    let hook = Arc::new(SyntheticHook::new());
    let mut listener = HotkeyListener::spawn(
        Arc::clone(&hook),
        h.state.hotkey_dispatcher(runtime.handle().clone()),
    )
    .unwrap();

    hook.inject(KeyEvent::Down(VK_LCONTROL));
    hook.inject(KeyEvent::Down(VK_RSHIFT));
    hook.inject(KeyEvent::Down(KEY_A));
    let playing = PlaybackState::Playing(id.clone());
    assert!(wait_until(Duration::from_secs(5), || h.state.engine.state() == playing));

    // Holding the combination does not re-trigger
    hook.inject(KeyEvent::Down(KEY_A));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(h.state.engine.state(), playing);

    // Release A and press it again: second toggle stops the clip
    hook.inject(KeyEvent::Up(KEY_A));
    hook.inject(KeyEvent::Down(KEY_A));
    assert!(wait_until(Duration::from_secs(5), || {
        h.state.engine.state() == PlaybackState::Idle
    }));

    listener.stop();
}

#[test]
fn partial_combination_does_nothing() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let h = Harness::new(Config::default());
    h.state.start_audio();
    let id = h.add_clip("airhorn.wav", 4410, 0.25);
    commands::update_hotkey(&h.state, id, "Ctrl+Shift+A".to_string()).unwrap();

    let mut dispatcher = h.state.hotkey_dispatcher(runtime.handle().clone());
    assert_eq!(dispatcher.on_key_down(VK_LCONTROL), None);
    assert_eq!(dispatcher.on_key_down(KEY_A), None);
    dispatcher.on_key_up(VK_LCONTROL);
    assert_eq!(dispatcher.on_key_down(VK_RSHIFT), None);
}

#[test]
fn escape_clears_a_hotkey() {
    let h = Harness::new(Config::default());
    let id = h.add_clip("a.wav", 100, 0.25);

    commands::update_hotkey(&h.state, id.clone(), "F5".to_string()).unwrap();
    assert_eq!(h.state.bindings.read().len(), 1);

    let stored = commands::update_hotkey(&h.state, id.clone(), "Esc".to_string()).unwrap();
    assert_eq!(stored, "");
    assert!(h.state.bindings.read().is_empty());

    let clips = commands::get_audios(&h.state).unwrap();
    assert_eq!(clips[0].hotkey, "");
}

#[test]
fn duplicate_hotkey_is_rejected() {
    let h = Harness::new(Config::default());
    let first = h.add_clip("first.wav", 100, 0.25);
    let second = h.add_clip("second.wav", 100, 0.25);

    commands::update_hotkey(&h.state, first.clone(), "Ctrl+Shift+A".to_string()).unwrap();
    let err = commands::update_hotkey(&h.state, second.clone(), "shift+ctrl+a".to_string())
        .unwrap_err();
    assert!(err.contains("first.wav"), "{}", err);

    // Re-assigning the same combination to its owner is fine
    commands::update_hotkey(&h.state, first, "Ctrl+Shift+A".to_string()).unwrap();
    assert!(commands::update_hotkey(&h.state, second, "Ctrl+Shift+B".to_string()).is_ok());
}

#[test]
fn reorder_changes_which_binding_wins() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut config = Config::default();
    config.audio_list = vec![
        daitoue_lib::library::Clip::new("x", "x.wav", "/x.wav", "Q", "1.0s", "0.01MB"),
        daitoue_lib::library::Clip::new("y", "y.wav", "/y.wav", "Q+Ctrl", "1.0s", "0.01MB"),
    ];
    let h = Harness::new(config);
    let mut dispatcher = h.state.hotkey_dispatcher(runtime.handle().clone());

    dispatcher.on_key_down(VK_LCONTROL);
    assert_eq!(dispatcher.on_key_down(81), Some("x".to_string()));
    dispatcher.on_key_up(81);

    commands::update_audio_order(&h.state, vec!["y".to_string()]).unwrap();
    assert_eq!(dispatcher.on_key_down(81), Some("y".to_string()));
}
