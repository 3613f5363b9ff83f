//! Text replacement for snippet expansion.
//!
//! Strategy:
//! 1. Wait for the delimiter keystroke to land in the target app
//! 2. Send one backspace per typed character plus the delimiter
//! 3. Put the replacement on the clipboard and send the paste chord
//! 4. Optionally restore the previous clipboard text
//!
//! If the clipboard is unavailable the replacement is typed character by
//! character instead.

use std::thread;
use std::time::Duration;

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::{debug, info, instrument, warn};

use super::ActionError;
use crate::config::EngineSettings;

/// Timing knobs for text replacement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextInjectorConfig {
    pub settle_delay: Duration,
    pub paste_delay: Duration,
    pub char_delay: Duration,
    pub restore_clipboard: bool,
}

impl Default for TextInjectorConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for TextInjectorConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            settle_delay: Duration::from_millis(settings.settle_delay_ms),
            paste_delay: Duration::from_millis(settings.paste_delay_ms),
            char_delay: Duration::from_millis(settings.char_delay_ms),
            restore_clipboard: settings.restore_clipboard,
        }
    }
}

pub struct TextInjector {
    config: TextInjectorConfig,
}

impl TextInjector {
    pub fn new(config: TextInjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TextInjectorConfig {
        &self.config
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn replace(&self, erase_count: usize, text: &str) -> Result<(), ActionError> {
        thread::sleep(self.config.settle_delay);

        let mut enigo =
            Enigo::new(&Settings::default()).map_err(|e| ActionError::Input(e.to_string()))?;

        for _ in 0..erase_count {
            enigo
                .key(Key::Backspace, Direction::Click)
                .map_err(|e| ActionError::Input(e.to_string()))?;
        }
        debug!(erase_count, "Erased trigger");

        thread::sleep(self.config.paste_delay);

        match self.paste(&mut enigo, text) {
            Ok(()) => {
                info!("Inserted replacement via clipboard");
                Ok(())
            }
            Err(ActionError::Clipboard(msg)) => {
                warn!(error = %msg, "Clipboard unavailable, typing replacement");
                self.type_chars(&mut enigo, text)
            }
            Err(e) => Err(e),
        }
    }

    fn paste(&self, enigo: &mut Enigo, text: &str) -> Result<(), ActionError> {
        let mut clipboard = Clipboard::new().map_err(|e| ActionError::Clipboard(e.to_string()))?;

        let original = if self.config.restore_clipboard {
            clipboard.get_text().ok()
        } else {
            None
        };

        clipboard
            .set_text(text)
            .map_err(|e| ActionError::Clipboard(e.to_string()))?;

        thread::sleep(Duration::from_millis(10));
        send_paste_chord(enigo)?;
        thread::sleep(self.config.paste_delay);

        if let Some(original_text) = original {
            // Give the target app time to read the clipboard before restoring.
            thread::sleep(Duration::from_millis(100));
            if let Err(e) = clipboard.set_text(original_text) {
                warn!(error = %e, "Failed to restore original clipboard");
            } else {
                debug!("Restored original clipboard");
            }
        }
        Ok(())
    }

    fn type_chars(&self, enigo: &mut Enigo, text: &str) -> Result<(), ActionError> {
        for c in text.chars() {
            enigo
                .text(&c.to_string())
                .map_err(|e| ActionError::Input(e.to_string()))?;
            thread::sleep(self.config.char_delay);
        }
        info!("Typed replacement character by character");
        Ok(())
    }
}

fn paste_modifier() -> Key {
    if cfg!(target_os = "macos") {
        Key::Meta
    } else {
        Key::Control
    }
}

fn send_paste_chord(enigo: &mut Enigo) -> Result<(), ActionError> {
    let modifier = paste_modifier();
    let input = |e: enigo::InputError| ActionError::Input(e.to_string());

    enigo.key(modifier, Direction::Press).map_err(input)?;
    let clicked = enigo.key(Key::Unicode('v'), Direction::Click).map_err(input);
    // Always release the modifier, even if the click failed.
    enigo.key(modifier, Direction::Release).map_err(input)?;
    clicked
}
