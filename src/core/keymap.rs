//! Normalization of raw key presses into symbolic key names.
//!
//! Everything the n-gram pipeline sees is a [`KeyName`]: either a printable
//! character or one of a fixed set of special keys. Presses that map to
//! neither (return, delete, function keys, modifiers) are dropped here.
//!
//! Key codes are read against a US ANSI layout. Platforms that resolve the
//! typed character themselves should send [`RawKey::Character`] instead.

use crate::collector::types::RawKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-printing keys that are still tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKey {
    Space,
    Up,
    Down,
    Left,
    Right,
    Esc,
    Tab,
}

impl SpecialKey {
    pub fn symbol(self) -> &'static str {
        match self {
            SpecialKey::Space => "<space>",
            SpecialKey::Up => "<up>",
            SpecialKey::Down => "<down>",
            SpecialKey::Left => "<left>",
            SpecialKey::Right => "<right>",
            SpecialKey::Esc => "<esc>",
            SpecialKey::Tab => "<tab>",
        }
    }
}

/// Canonical name of a pressed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyName {
    Char(char),
    Special(SpecialKey),
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyName::Char(c) => write!(f, "{c}"),
            KeyName::Special(key) => f.write_str(key.symbol()),
        }
    }
}

// macOS virtual key codes (kVK_*) for the special keys.
const KVK_TAB: u16 = 0x30;
const KVK_SPACE: u16 = 0x31;
const KVK_ESCAPE: u16 = 0x35;
const KVK_LEFT_ARROW: u16 = 0x7B;
const KVK_RIGHT_ARROW: u16 = 0x7C;
const KVK_DOWN_ARROW: u16 = 0x7D;
const KVK_UP_ARROW: u16 = 0x7E;

/// ANSI layout: (virtual key code, unshifted, shifted).
const ANSI_KEYS: &[(u16, char, char)] = &[
    (0x00, 'a', 'A'),
    (0x01, 's', 'S'),
    (0x02, 'd', 'D'),
    (0x03, 'f', 'F'),
    (0x04, 'h', 'H'),
    (0x05, 'g', 'G'),
    (0x06, 'z', 'Z'),
    (0x07, 'x', 'X'),
    (0x08, 'c', 'C'),
    (0x09, 'v', 'V'),
    (0x0B, 'b', 'B'),
    (0x0C, 'q', 'Q'),
    (0x0D, 'w', 'W'),
    (0x0E, 'e', 'E'),
    (0x0F, 'r', 'R'),
    (0x10, 'y', 'Y'),
    (0x11, 't', 'T'),
    (0x12, '1', '!'),
    (0x13, '2', '@'),
    (0x14, '3', '#'),
    (0x15, '4', '$'),
    (0x16, '6', '^'),
    (0x17, '5', '%'),
    (0x18, '=', '+'),
    (0x19, '9', '('),
    (0x1A, '7', '&'),
    (0x1B, '-', '_'),
    (0x1C, '8', '*'),
    (0x1D, '0', ')'),
    (0x1E, ']', '}'),
    (0x1F, 'o', 'O'),
    (0x20, 'u', 'U'),
    (0x21, '[', '{'),
    (0x22, 'i', 'I'),
    (0x23, 'p', 'P'),
    (0x25, 'l', 'L'),
    (0x26, 'j', 'J'),
    (0x27, '\'', '"'),
    (0x28, 'k', 'K'),
    (0x29, ';', ':'),
    (0x2A, '\\', '|'),
    (0x2B, ',', '<'),
    (0x2C, '/', '?'),
    (0x2D, 'n', 'N'),
    (0x2E, 'm', 'M'),
    (0x2F, '.', '>'),
    (0x32, '`', '~'),
];

/// Map a raw key to its symbolic name, or `None` if it is not tracked.
pub fn normalize(key: &RawKey) -> Option<KeyName> {
    match *key {
        RawKey::Character(c) => normalize_char(c),
        RawKey::KeyCode {
            code,
            shift,
            caps_lock,
        } => normalize_code(code, shift, caps_lock),
    }
}

fn normalize_char(c: char) -> Option<KeyName> {
    match c {
        ' ' => Some(KeyName::Special(SpecialKey::Space)),
        '\t' => Some(KeyName::Special(SpecialKey::Tab)),
        '\u{1b}' => Some(KeyName::Special(SpecialKey::Esc)),
        c if c.is_control() => None,
        c => Some(KeyName::Char(c)),
    }
}

fn normalize_code(code: u16, shift: bool, caps_lock: bool) -> Option<KeyName> {
    let special = match code {
        KVK_SPACE => Some(SpecialKey::Space),
        KVK_TAB => Some(SpecialKey::Tab),
        KVK_ESCAPE => Some(SpecialKey::Esc),
        KVK_LEFT_ARROW => Some(SpecialKey::Left),
        KVK_RIGHT_ARROW => Some(SpecialKey::Right),
        KVK_DOWN_ARROW => Some(SpecialKey::Down),
        KVK_UP_ARROW => Some(SpecialKey::Up),
        _ => None,
    };
    if let Some(key) = special {
        return Some(KeyName::Special(key));
    }

    ANSI_KEYS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|&(_, plain, shifted)| {
            // Caps lock inverts shift for letters only.
            let upper = if plain.is_ascii_alphabetic() {
                shift != caps_lock
            } else {
                shift
            };
            KeyName::Char(if upper { shifted } else { plain })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_key_symbols() {
        assert_eq!(KeyName::Special(SpecialKey::Space).to_string(), "<space>");
        assert_eq!(KeyName::Special(SpecialKey::Esc).to_string(), "<esc>");
        assert_eq!(KeyName::Char('k').to_string(), "k");
    }

    #[test]
    fn test_characters_pass_through() {
        assert_eq!(normalize(&RawKey::Character('a')), Some(KeyName::Char('a')));
        assert_eq!(normalize(&RawKey::Character('ї')), Some(KeyName::Char('ї')));
        assert_eq!(
            normalize(&RawKey::Character(' ')),
            Some(KeyName::Special(SpecialKey::Space))
        );
    }

    #[test]
    fn test_control_characters_dropped() {
        assert_eq!(normalize(&RawKey::Character('\r')), None);
        assert_eq!(normalize(&RawKey::Character('\u{8}')), None);
    }

    #[test]
    fn test_key_codes() {
        let up = RawKey::KeyCode {
            code: 0x7E,
            shift: false,
            caps_lock: false,
        };
        assert_eq!(normalize(&up), Some(KeyName::Special(SpecialKey::Up)));

        let a = RawKey::KeyCode {
            code: 0x00,
            shift: false,
            caps_lock: false,
        };
        assert_eq!(normalize(&a), Some(KeyName::Char('a')));

        let shifted = RawKey::KeyCode {
            code: 0x12,
            shift: true,
            caps_lock: false,
        };
        assert_eq!(normalize(&shifted), Some(KeyName::Char('!')));
    }

    fn code(code: u16, shift: bool, caps_lock: bool) -> Option<KeyName> {
        normalize(&RawKey::KeyCode {
            code,
            shift,
            caps_lock,
        })
    }

    #[test]
    fn test_caps_lock_uppercases_letters() {
        assert_eq!(code(0x00, false, true), Some(KeyName::Char('A')));
        // Shift with caps lock on gives lowercase again.
        assert_eq!(code(0x00, true, true), Some(KeyName::Char('a')));
    }

    #[test]
    fn test_caps_lock_leaves_symbols_alone() {
        assert_eq!(code(0x12, false, true), Some(KeyName::Char('1')));
        assert_eq!(code(0x12, true, true), Some(KeyName::Char('!')));
        assert_eq!(
            code(0x31, false, true),
            Some(KeyName::Special(SpecialKey::Space))
        );
    }

    #[test]
    fn test_untracked_codes_dropped() {
        // Return and delete are not tracked.
        for code in [0x24, 0x33, 0x7A] {
            assert_eq!(
                normalize(&RawKey::KeyCode {
                    code,
                    shift: false,
                    caps_lock: false,
                }),
                None
            );
        }
    }
}
