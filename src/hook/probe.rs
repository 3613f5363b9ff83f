//! Hotkey conflict detection.
//!
//! A low-level hook sees every key, so it can never "fail" to register a
//! combination. To report combinations another process has already claimed,
//! the trigger is briefly registered through `global-hotkey` and released
//! again. The OS rejects the registration when someone else owns it.

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{Error as HotkeyError, GlobalHotKeyManager};
use tracing::{debug, warn};

use super::HookError;
use crate::trigger::{KeyToken, Trigger};

/// Check whether `trigger` is free to use system-wide.
///
/// Triggers that `global-hotkey` cannot express (no key, several keys, opaque
/// tokens) are assumed free. A probe that cannot run at all is logged and
/// treated as free too; only an explicit OS rejection is a conflict.
pub fn probe_conflict(trigger: &Trigger) -> Result<(), HookError> {
    let Some(hotkey) = to_hotkey(trigger) else {
        debug!(trigger = %trigger, "Trigger not expressible as a system hotkey, skipping probe");
        return Ok(());
    };

    let manager = match GlobalHotKeyManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            warn!(error = %e, trigger = %trigger, "Hotkey probe unavailable");
            return Ok(());
        }
    };

    match manager.register(hotkey) {
        Ok(()) => {
            if let Err(e) = manager.unregister(hotkey) {
                warn!(error = %e, trigger = %trigger, "Failed to release hotkey probe");
            }
            Ok(())
        }
        Err(e) => match conflict_reason(&e) {
            Some(reason) => Err(HookError::Conflict {
                trigger: trigger.format(),
                reason,
            }),
            None => {
                warn!(error = %e, trigger = %trigger, "Hotkey probe failed");
                Ok(())
            }
        },
    }
}

fn conflict_reason(error: &HotkeyError) -> Option<String> {
    match error {
        HotkeyError::AlreadyRegistered(_) => Some("registered by another hotkey".to_string()),
        HotkeyError::FailedToRegister(msg) => Some(format!("rejected by the system: {msg}")),
        _ => None,
    }
}

/// Convert a trigger to a `global-hotkey` combination: modifiers plus exactly one key.
pub(crate) fn to_hotkey(trigger: &Trigger) -> Option<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut code = None;

    for key in trigger.keys() {
        match key.as_str() {
            "ctrl" => modifiers |= Modifiers::CONTROL,
            "alt" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "windows" => modifiers |= Modifiers::SUPER,
            _ => {
                if code.is_some() {
                    return None;
                }
                code = Some(to_code(key)?);
            }
        }
    }

    let mods = (!modifiers.is_empty()).then_some(modifiers);
    Some(HotKey::new(mods, code?))
}

fn to_code(key: &KeyToken) -> Option<Code> {
    let name = key.as_str();
    let w3c = match name {
        "space" => "Space".to_string(),
        "enter" => "Enter".to_string(),
        "tab" => "Tab".to_string(),
        "escape" => "Escape".to_string(),
        "backspace" => "Backspace".to_string(),
        "delete" => "Delete".to_string(),
        "insert" => "Insert".to_string(),
        "up" => "ArrowUp".to_string(),
        "down" => "ArrowDown".to_string(),
        "left" => "ArrowLeft".to_string(),
        "right" => "ArrowRight".to_string(),
        "home" => "Home".to_string(),
        "end" => "End".to_string(),
        "pageup" => "PageUp".to_string(),
        "pagedown" => "PageDown".to_string(),
        "capslock" => "CapsLock".to_string(),
        "numlock" => "NumLock".to_string(),
        "scrolllock" => "ScrollLock".to_string(),
        "printscreen" => "PrintScreen".to_string(),
        "pause" => "Pause".to_string(),
        "apps" => "ContextMenu".to_string(),
        "semicolon" => "Semicolon".to_string(),
        "quote" => "Quote".to_string(),
        "comma" => "Comma".to_string(),
        "period" => "Period".to_string(),
        "slash" => "Slash".to_string(),
        "backslash" => "Backslash".to_string(),
        "bracketleft" => "BracketLeft".to_string(),
        "bracketright" => "BracketRight".to_string(),
        "minus" => "Minus".to_string(),
        "equal" => "Equal".to_string(),
        "backquote" => "Backquote".to_string(),
        "multiply" => "NumpadMultiply".to_string(),
        "add" => "NumpadAdd".to_string(),
        "subtract" => "NumpadSubtract".to_string(),
        "decimal" => "NumpadDecimal".to_string(),
        "divide" => "NumpadDivide".to_string(),
        _ => {
            if let Some(n) = name.strip_prefix("num").filter(|n| n.len() == 1) {
                format!("Numpad{n}")
            } else if name.starts_with('f') && name.len() > 1 && key.is_known() {
                name.to_uppercase()
            } else {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_lowercase() => {
                        format!("Key{}", c.to_ascii_uppercase())
                    }
                    (Some(c), None) if c.is_ascii_digit() => format!("Digit{c}"),
                    _ => return None,
                }
            }
        }
    };
    w3c.parse().ok()
}
