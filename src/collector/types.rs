//! Raw key press types delivered by the capture layer.
//!
//! These are platform-shaped values. They are turned into symbolic key names
//! by [`crate::core::keymap::normalize`] before reaching the n-gram pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The platform identity of a pressed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawKey {
    /// A key whose text the platform already resolved to a character.
    Character(char),
    /// A virtual key code plus the shift and caps-lock state at the time of
    /// the press.
    KeyCode {
        code: u16,
        shift: bool,
        caps_lock: bool,
    },
}

/// A single key press as seen by the capture layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawKeyPress {
    /// Timestamp when the key went down
    pub timestamp: DateTime<Utc>,
    /// Which key went down
    pub key: RawKey,
}

impl RawKeyPress {
    pub fn new(key: RawKey) -> Self {
        Self {
            timestamp: Utc::now(),
            key,
        }
    }

    /// Create a press with an explicit timestamp.
    pub fn at(key: RawKey, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, key }
    }

    /// Shorthand for a press that already carries a character.
    pub fn character(c: char, timestamp: DateTime<Utc>) -> Self {
        Self::at(RawKey::Character(c), timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_creation() {
        let before = Utc::now();
        let press = RawKeyPress::new(RawKey::KeyCode {
            code: 49,
            shift: false,
            caps_lock: false,
        });
        assert!(press.timestamp >= before);
        assert_eq!(
            press.key,
            RawKey::KeyCode {
                code: 49,
                shift: false,
                caps_lock: false,
            }
        );
    }

    #[test]
    fn test_character_shorthand() {
        let ts = Utc::now();
        let press = RawKeyPress::character('q', ts);
        assert_eq!(press.key, RawKey::Character('q'));
        assert_eq!(press.timestamp, ts);
    }
}
