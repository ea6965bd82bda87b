// Keyboard hook capability and the listener thread that drives the dispatcher.
//
// The OS-level global hook is provided by the host. Anything that can deliver
// key-down/key-up events in order implements `KeyboardHook`;
// `SyntheticHook` is the in-process implementation used by the stdin host
// and by tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::dispatcher::HotkeyDispatcher;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down(u16),
    Up(u16),
}

/// Returned by [`KeyboardHook::subscribe`]; hand it back to unsubscribe.
#[derive(Debug, PartialEq, Eq)]
pub struct CancelToken(u64);

pub trait KeyboardHook: Send + Sync {
    /// Start delivering key events to `events`, in the order they occur.
    fn subscribe(&self, events: Sender<KeyEvent>) -> Result<CancelToken>;

    /// Stop delivering and drop the subscriber's sender.
    fn unsubscribe(&self, token: CancelToken);
}

/// A hook fed by [`SyntheticHook::inject`] instead of the OS.
#[derive(Default)]
pub struct SyntheticHook {
    subscribers: Mutex<Vec<(u64, Sender<KeyEvent>)>>,
    next_id: AtomicU64,
}

impl SyntheticHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every subscriber. Returns how many received it.
    pub fn inject(&self, event: KeyEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, tx)| tx.send(event).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl KeyboardHook for SyntheticHook {
    fn subscribe(&self, events: Sender<KeyEvent>) -> Result<CancelToken> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, events));
        Ok(CancelToken(id))
    }

    fn unsubscribe(&self, token: CancelToken) {
        self.subscribers.lock().retain(|(id, _)| *id != token.0);
    }
}

/// Owns the thread that feeds hook events into a [`HotkeyDispatcher`].
pub struct HotkeyListener<H: KeyboardHook + ?Sized> {
    hook: Arc<H>,
    token: Option<CancelToken>,
    thread: Option<JoinHandle<()>>,
}

impl<H: KeyboardHook + ?Sized> HotkeyListener<H> {
    pub fn spawn(hook: Arc<H>, mut dispatcher: HotkeyDispatcher) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let token = hook.subscribe(tx)?;

        let thread = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                // Ends once the hook drops our sender.
                for event in rx {
                    dispatcher.handle(event);
                }
                debug!("Hotkey listener drained");
            })
            .map_err(|e| Error::Hook(format!("failed to spawn listener thread: {}", e)))?;

        info!("Hotkey listener started");
        Ok(Self {
            hook,
            token: Some(token),
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            self.hook.unsubscribe(token);
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            info!("Hotkey listener stopped");
        }
    }
}

impl<H: KeyboardHook + ?Sized> Drop for HotkeyListener<H> {
    fn drop(&mut self) {
        self.stop();
    }
}
