// Daitoue - hotkey soundboard
// Module declarations
pub mod audio;
pub mod commands;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod library;
pub mod settings;
pub mod state;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use audio::device::CpalBackend;
use hotkey::hook::{HotkeyListener, KeyEvent, SyntheticHook};
use settings::ConfigStore;
use state::AppState;

pub use error::{Error, Result};

const DEFAULT_LOG_FILTER: &str = "daitoue=info,daitoue_lib=info";

const HELP: &str = "\
commands:
  list                          clips in order
  import <path>...              add files or folders
  delete <id>
  order <id>...                 reorder clips
  hotkey <id> <combo>           e.g. Ctrl+Shift+A, Esc clears
  play <id>                     toggle a clip
  stop
  state
  devices
  audio <main> <aux> <volume>   use - for an empty selector
  reset
  key down|up <vk-code>         feed the hotkey listener
  config
  quit

Quote arguments that contain spaces: audio \"CABLE Input (VB-Audio Virtual Cable)\" - 50";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Run the soundboard with a line-oriented host on stdin/stdout.
///
/// The real shell (window, tray, OS keyboard hook) sits outside this crate;
/// here commands arrive as text and key events are injected by hand.
pub fn run() -> anyhow::Result<()> {
    init_tracing();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let store = ConfigStore::default_location();
    info!(path = %store.path().display(), "Using config");

    let state = Arc::new(AppState::new(store, Arc::new(CpalBackend::new())));
    let report = state.start_audio();
    print_json(&report);

    let hook = Arc::new(SyntheticHook::new());
    let mut listener = HotkeyListener::spawn(
        Arc::clone(&hook),
        state.hotkey_dispatcher(runtime.handle().clone()),
    )
    .context("Failed to start hotkey listener")?;

    let mut events = state.notifier.subscribe();
    runtime.spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_json(&event),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let args = match split_args(&line) {
            Ok(args) => args,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };
        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] => break,
            _ => execute(&state, &hook, &words),
        }
    }

    listener.stop();
    state.shutdown();
    runtime.shutdown_background();
    info!("Bye");
    Ok(())
}

fn execute(state: &AppState, hook: &SyntheticHook, words: &[&str]) {
    let owned = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect::<Vec<_>>();

    match words {
        ["list"] => reply(commands::get_audios(state)),
        ["import", paths @ ..] if !paths.is_empty() => {
            reply(commands::import_audio_files(state, owned(paths)))
        }
        ["delete", id] => reply(commands::delete_audio(state, id.to_string())),
        ["order", ids @ ..] => reply(commands::update_audio_order(state, owned(ids))),
        ["hotkey", id, combo] => reply(commands::update_hotkey(
            state,
            id.to_string(),
            combo.to_string(),
        )),
        ["play", id] => reply(commands::play_audio_id(state, id.to_string())),
        ["stop"] => reply(commands::stop_audio(state)),
        ["state"] => reply(commands::get_playback_state(state)),
        ["devices"] => reply(commands::get_audio_devices(state)),
        ["audio", main, aux, volume] => match volume.parse::<f64>() {
            Ok(volume) => reply(commands::set_audio_settings(
                state,
                selector_arg(main),
                selector_arg(aux),
                volume.clamp(0.0, 100.0),
            )),
            Err(_) => println!("error: volume must be a number"),
        },
        ["reset"] => reply(commands::reset_audio(state)),
        ["key", direction, code] => match (*direction, code.parse::<u16>()) {
            ("down", Ok(code)) => {
                hook.inject(KeyEvent::Down(code));
            }
            ("up", Ok(code)) => {
                hook.inject(KeyEvent::Up(code));
            }
            _ => println!("error: key down|up <vk-code>"),
        },
        ["config"] => reply(commands::get_config(state)),
        _ => println!("{}", HELP),
    }
}

/// Split a command line into arguments. Whitespace separates, and `"..."` or
/// `'...'` keeps spaces inside one argument. Backslashes are literal so
/// Windows paths pass through untouched.
fn split_args(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_arg = true;
            }
            None if ch.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(ch);
                in_arg = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

fn selector_arg(raw: &str) -> String {
    if raw == "-" {
        String::new()
    } else {
        raw.to_string()
    }
}

fn reply<T: Serialize>(result: std::result::Result<T, String>) {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => println!("error: {}", e),
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", json);
        }
        Err(e) => warn!(error = %e, "Failed to serialize reply"),
    }
}
