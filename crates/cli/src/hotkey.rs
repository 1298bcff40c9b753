//! Global hotkey listener built on `rdev`.
//!
//! `rdev::grab` installs a system-wide keyboard hook and blocks its thread
//! forever, so the hook is installed once at startup and the binding it
//! matches against is swapped in place by [`RdevHotkeys`]. Key events that
//! belong to the hotkey are swallowed so the focused application never sees
//! them; everything else passes through untouched.

use paste_helper_core::error::{AppError, Result};
use paste_helper_core::hotkey::{Hotkey, HotkeyRegistrar, Modifier};
use paste_helper_core::HostEvent;
use rdev::{EventType, Key};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, info};

/// The combination the listener currently reacts to. `None` disables it.
pub type Binding = Arc<Mutex<Option<Hotkey>>>;

/// Registrar that only updates the shared [`Binding`].
pub struct RdevHotkeys {
    binding: Binding,
}

impl RdevHotkeys {
    pub fn new(binding: Binding) -> Self {
        Self { binding }
    }
}

impl HotkeyRegistrar for RdevHotkeys {
    fn register(&mut self, hotkey: &Hotkey) -> Result<()> {
        if key_for_char(hotkey.key).is_none() {
            return Err(AppError::hotkey(format!("Unsupported key: {}", hotkey.key)));
        }
        let mut slot = self
            .binding
            .lock()
            .map_err(|_| AppError::hotkey("Hotkey binding lock poisoned"))?;
        *slot = Some(*hotkey);
        Ok(())
    }

    fn unregister(&mut self) {
        if let Ok(mut slot) = self.binding.lock() {
            *slot = None;
        }
    }
}

/// Modifier keys currently held down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Held {
    ctrl: bool,
    shift: bool,
    alt: bool,
    meta: bool,
}

impl Held {
    /// Records a modifier transition. Returns false for non-modifier keys.
    fn update(&mut self, key: Key, down: bool) -> bool {
        let flag = match key {
            Key::ControlLeft | Key::ControlRight => &mut self.ctrl,
            Key::ShiftLeft | Key::ShiftRight => &mut self.shift,
            Key::Alt | Key::AltGr => &mut self.alt,
            Key::MetaLeft | Key::MetaRight => &mut self.meta,
            _ => return false,
        };
        *flag = down;
        true
    }

    /// The exact set a hotkey needs: "CommandOrControl" (Cmd on macOS,
    /// Ctrl elsewhere) plus its second modifier, and nothing else.
    fn required(modifier: Modifier) -> Self {
        let mac = cfg!(target_os = "macos");
        Self {
            ctrl: !mac,
            meta: mac || modifier == Modifier::Super,
            shift: modifier == Modifier::Shift,
            alt: modifier == Modifier::Alt,
        }
    }
}

pub(crate) fn key_for_char(c: char) -> Option<Key> {
    let key = match c.to_ascii_uppercase() {
        'A' => Key::KeyA,
        'B' => Key::KeyB,
        'C' => Key::KeyC,
        'D' => Key::KeyD,
        'E' => Key::KeyE,
        'F' => Key::KeyF,
        'G' => Key::KeyG,
        'H' => Key::KeyH,
        'I' => Key::KeyI,
        'J' => Key::KeyJ,
        'K' => Key::KeyK,
        'L' => Key::KeyL,
        'M' => Key::KeyM,
        'N' => Key::KeyN,
        'O' => Key::KeyO,
        'P' => Key::KeyP,
        'Q' => Key::KeyQ,
        'R' => Key::KeyR,
        'S' => Key::KeyS,
        'T' => Key::KeyT,
        'U' => Key::KeyU,
        'V' => Key::KeyV,
        'W' => Key::KeyW,
        'X' => Key::KeyX,
        'Y' => Key::KeyY,
        'Z' => Key::KeyZ,
        '0' => Key::Num0,
        '1' => Key::Num1,
        '2' => Key::Num2,
        '3' => Key::Num3,
        '4' => Key::Num4,
        '5' => Key::Num5,
        '6' => Key::Num6,
        '7' => Key::Num7,
        '8' => Key::Num8,
        '9' => Key::Num9,
        _ => return None,
    };
    Some(key)
}

/// What to do with one raw keyboard event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verdict {
    /// Not ours; hand it on to the system.
    Pass,
    /// The bound combination was pressed.
    Fire,
    /// Autorepeat or release of a fired key; hide it as well.
    Swallow,
}

/// Key state machine fed by raw keyboard events.
#[derive(Debug, Default)]
struct Matcher {
    held: Held,
    /// Set after a match until the main key is released, to ignore autorepeat.
    latched: bool,
}

impl Matcher {
    fn feed(&mut self, binding: Option<Hotkey>, event: &EventType) -> Verdict {
        let (key, down) = match event {
            EventType::KeyPress(key) => (*key, true),
            EventType::KeyRelease(key) => (*key, false),
            _ => return Verdict::Pass,
        };
        if self.held.update(key, down) {
            return Verdict::Pass;
        }

        let Some(hotkey) = binding else {
            self.latched = false;
            return Verdict::Pass;
        };
        if key_for_char(hotkey.key) != Some(key) {
            return Verdict::Pass;
        }

        if !down {
            let was_latched = self.latched;
            self.latched = false;
            return if was_latched {
                Verdict::Swallow
            } else {
                Verdict::Pass
            };
        }
        if self.latched {
            return Verdict::Swallow;
        }
        if self.held == Held::required(hotkey.modifier) {
            self.latched = true;
            return Verdict::Fire;
        }
        Verdict::Pass
    }
}

/// Starts the keyboard hook on a dedicated thread.
///
/// Each match sends [`HostEvent::HotkeyPressed`] to `events`. A hook that
/// cannot be installed is logged; the popup still works without it.
pub fn spawn_listener(binding: Binding, events: Sender<HostEvent>) -> Result<()> {
    thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            // `grab` wants an `Fn` callback.
            let matcher = Mutex::new(Matcher::default());
            let callback = move |event: rdev::Event| -> Option<rdev::Event> {
                let current = binding.lock().ok().and_then(|slot| *slot);
                let verdict = match matcher.lock() {
                    Ok(mut m) => m.feed(current, &event.event_type),
                    Err(_) => Verdict::Pass,
                };
                match verdict {
                    Verdict::Pass => Some(event),
                    Verdict::Fire => {
                        debug!("Hotkey matched");
                        let _ = events.send(HostEvent::HotkeyPressed);
                        None
                    }
                    Verdict::Swallow => None,
                }
            };
            info!("Keyboard listener started");
            if let Err(e) = rdev::grab(callback) {
                error!("Keyboard listener failed: {:?}", e);
            }
        })
        .map_err(|e| AppError::hotkey(format!("Failed to spawn listener thread: {}", e)))?;
    Ok(())
}
