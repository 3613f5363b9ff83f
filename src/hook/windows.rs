//! `WH_KEYBOARD_LL` backend.
//!
//! The hook procedure is a bare `extern "system"` function, so the active
//! sink lives in a process-wide slot. Only one `WindowsHook` may fill it at a
//! time, which is what keeps a single low-level hook installed.
//!
//! Low-level hooks are serviced by the installing thread's message loop, so
//! each install spawns a dedicated thread that pumps messages until it is
//! asked to quit.

use std::sync::atomic::{AtomicIsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, GetKeyState};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_INJECTED,
    MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::{HookBackend, HookError, KeyDirection, KeyEvent, KeySink, KeyStateFn, Verdict};
use crate::trigger::{KeyToken, Trigger};

static ACTIVE_SINK: Mutex<Option<KeySink>> = parking_lot::const_mutex(None);
static HOOK_HANDLE: AtomicIsize = AtomicIsize::new(0);

const VK_SHIFT: i32 = 0x10;
const VK_CAPITAL: i32 = 0x14;

pub struct WindowsHook {
    thread: Option<(u32, JoinHandle<()>)>,
}

impl WindowsHook {
    pub fn new() -> Self {
        Self { thread: None }
    }
}

impl Default for WindowsHook {
    fn default() -> Self {
        Self::new()
    }
}

impl HookBackend for WindowsHook {
    fn install(&mut self, sink: KeySink) -> Result<(), HookError> {
        {
            let mut slot = ACTIVE_SINK.lock();
            if slot.is_some() {
                return Err(HookError::AlreadyInstalled);
            }
            *slot = Some(sink);
        }

        let (ready_tx, ready_rx) = async_channel::bounded::<Result<u32, String>>(1);
        let spawned = std::thread::Builder::new()
            .name("hotwire-hook".to_string())
            .spawn(move || run_hook_thread(ready_tx));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                *ACTIVE_SINK.lock() = None;
                return Err(HookError::Install(e.to_string()));
            }
        };

        match ready_rx.recv_blocking() {
            Ok(Ok(thread_id)) => {
                self.thread = Some((thread_id, handle));
                info!(thread_id, "Keyboard hook installed");
                Ok(())
            }
            Ok(Err(msg)) => {
                let _ = handle.join();
                *ACTIVE_SINK.lock() = None;
                Err(HookError::Install(msg))
            }
            Err(_) => {
                let _ = handle.join();
                *ACTIVE_SINK.lock() = None;
                Err(HookError::Install("hook thread exited early".to_string()))
            }
        }
    }

    fn uninstall(&mut self) {
        let Some((thread_id, handle)) = self.thread.take() else {
            return;
        };
        // SAFETY: posting to a thread id we created; failure only means it already exited.
        if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!(error = %e, thread_id, "Failed to signal hook thread");
        }
        if handle.join().is_err() {
            error!("Hook thread panicked");
        }
        *ACTIVE_SINK.lock() = None;
        info!("Keyboard hook uninstalled");
    }

    fn is_installed(&self) -> bool {
        self.thread.is_some()
    }

    fn claim(&mut self, trigger: &Trigger) -> Result<(), HookError> {
        super::probe_conflict(trigger)
    }

    fn release_all(&mut self) {}

    fn key_state(&self) -> Option<KeyStateFn> {
        let is_down: KeyStateFn = std::sync::Arc::new(is_physically_down);
        Some(is_down)
    }
}

impl Drop for WindowsHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn run_hook_thread(ready: async_channel::Sender<Result<u32, String>>) {
    // SAFETY: standard low-level hook install on the current thread.
    let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) };
    let hook = match hook {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send_blocking(Err(e.to_string()));
            return;
        }
    };
    HOOK_HANDLE.store(hook.0 as isize, Ordering::SeqCst);

    // SAFETY: plain thread id query.
    let thread_id = unsafe { GetCurrentThreadId() };
    if ready.send_blocking(Ok(thread_id)).is_err() {
        unhook(hook);
        return;
    }

    let mut msg = MSG::default();
    // SAFETY: message pump for this thread; returns 0 on WM_QUIT and -1 on error.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    unhook(hook);
    debug!("Hook thread message loop exited");
}

fn unhook(hook: HHOOK) {
    HOOK_HANDLE.store(0, Ordering::SeqCst);
    // SAFETY: `hook` came from SetWindowsHookExW on this thread.
    if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
        warn!(error = %e, "UnhookWindowsHookEx failed");
    }
}

unsafe extern "system" fn keyboard_hook_proc(ncode: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if ncode == HC_ACTION as i32 {
        let direction = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyDirection::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyDirection::Up),
            _ => None,
        };

        if let Some(direction) = direction {
            let data = *(lparam.0 as *const KBDLLHOOKSTRUCT);
            let sink = ACTIVE_SINK.lock().clone();
            if let (Some(sink), Some(key)) = (sink, vk_to_token(data.vkCode)) {
                let character = match direction {
                    KeyDirection::Down => vk_to_char(data.vkCode, shift_down(), caps_lock_on()),
                    KeyDirection::Up => None,
                };
                let event = KeyEvent {
                    key,
                    direction,
                    character,
                    injected: data.flags.0 & LLKHF_INJECTED.0 != 0,
                };
                if sink(&event) == Verdict::Suppress {
                    return LRESULT(1);
                }
            }
        }
    }

    let hook = HOOK_HANDLE.load(Ordering::SeqCst);
    CallNextHookEx(Some(HHOOK(hook as *mut _)), ncode, wparam, lparam)
}

fn shift_down() -> bool {
    // SAFETY: plain key state query.
    unsafe { GetAsyncKeyState(VK_SHIFT) as u16 & 0x8000 != 0 }
}

/// Asynchronous key state for every virtual key that maps to `key`.
///
/// Tokens with no virtual key are reported as down so they are never dropped.
fn is_physically_down(key: &KeyToken) -> bool {
    let vks = token_to_vks(key);
    if vks.is_empty() {
        return true;
    }
    vks.into_iter().any(|vk| {
        // SAFETY: plain key state query.
        unsafe { GetAsyncKeyState(vk as i32) as u16 & 0x8000 != 0 }
    })
}

fn token_to_vks(key: &KeyToken) -> Vec<u32> {
    match key.as_str() {
        "shift" => vec![0x10],
        "ctrl" => vec![0x11],
        "alt" => vec![0x12],
        "windows" => vec![0x5B, 0x5C],
        _ => (0x01..=0xFE)
            .filter(|vk| vk_to_token(*vk).as_ref() == Some(key))
            .collect(),
    }
}

fn caps_lock_on() -> bool {
    // SAFETY: plain key state query.
    unsafe { GetKeyState(VK_CAPITAL) & 1 != 0 }
}

/// Map a virtual-key code to a canonical token.
pub(crate) fn vk_to_token(vk: u32) -> Option<KeyToken> {
    let name = match vk {
        0x41..=0x5A | 0x30..=0x39 => {
            let c = char::from_u32(vk)?.to_ascii_lowercase();
            return Some(KeyToken::new(&c.to_string()));
        }
        0x70..=0x87 => return Some(KeyToken::new(&format!("f{}", vk - 0x6F))),
        0x60..=0x69 => return Some(KeyToken::new(&format!("num{}", vk - 0x60))),
        0x10 | 0xA0 | 0xA1 => "shift",
        0x11 | 0xA2 | 0xA3 => "ctrl",
        0x12 | 0xA4 | 0xA5 => "alt",
        0x5B | 0x5C => "windows",
        0x5D => "apps",
        0x08 => "backspace",
        0x09 => "tab",
        0x0D => "enter",
        0x13 => "pause",
        0x14 => "capslock",
        0x1B => "escape",
        0x20 => "space",
        0x21 => "pageup",
        0x22 => "pagedown",
        0x23 => "end",
        0x24 => "home",
        0x25 => "left",
        0x26 => "up",
        0x27 => "right",
        0x28 => "down",
        0x2C => "printscreen",
        0x2D => "insert",
        0x2E => "delete",
        0x6A => "multiply",
        0x6B => "add",
        0x6D => "subtract",
        0x6E => "decimal",
        0x6F => "divide",
        0x90 => "numlock",
        0x91 => "scrolllock",
        0xAD => "volumemute",
        0xAE => "volumedown",
        0xAF => "volumeup",
        0xB0 => "nexttrack",
        0xB1 => "prevtrack",
        0xB3 => "playpause",
        0xBA => "semicolon",
        0xBB => "equal",
        0xBC => "comma",
        0xBD => "minus",
        0xBE => "period",
        0xBF => "slash",
        0xC0 => "backquote",
        0xDB => "bracketleft",
        0xDC => "backslash",
        0xDD => "bracketright",
        0xDE => "quote",
        _ => return None,
    };
    Some(KeyToken::new(name))
}

/// Printable character for a virtual-key code on a US layout.
pub(crate) fn vk_to_char(vk: u32, shift: bool, caps_lock: bool) -> Option<char> {
    const SHIFTED_DIGITS: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];

    let c = match vk {
        0x41..=0x5A => {
            let upper = char::from_u32(vk)?;
            if shift != caps_lock {
                upper
            } else {
                upper.to_ascii_lowercase()
            }
        }
        0x30..=0x39 => {
            let digit = (vk - 0x30) as usize;
            if shift {
                SHIFTED_DIGITS[digit]
            } else {
                char::from_u32(vk)?
            }
        }
        0x60..=0x69 => char::from_u32(vk - 0x60 + u32::from(b'0'))?,
        0x20 => ' ',
        0x6A => '*',
        0x6B => '+',
        0x6D => '-',
        0x6E => '.',
        0x6F => '/',
        _ => {
            let (plain, shifted) = match vk {
                0xBA => (';', ':'),
                0xBB => ('=', '+'),
                0xBC => (',', '<'),
                0xBD => ('-', '_'),
                0xBE => ('.', '>'),
                0xBF => ('/', '?'),
                0xC0 => ('`', '~'),
                0xDB => ('[', '{'),
                0xDC => ('\\', '|'),
                0xDD => (']', '}'),
                0xDE => ('\'', '"'),
                _ => return None,
            };
            if shift {
                shifted
            } else {
                plain
            }
        }
    };
    Some(c)
}
