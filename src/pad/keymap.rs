//! XBAND keyboard scancode table
//!
//! Normal scancodes are looked up by `(code & 0x0F, code >> 4)`. A scancode
//! following [`SCANCODE_SPECIAL`] selects the small arrow key table instead,
//! and [`SCANCODE_RELEASE`] marks the next scancode as a key release.

use serde::Serialize;

/// Next scancode is a key release
pub const SCANCODE_RELEASE: u8 = 0xF0;
/// Next scancode comes from the special table
pub const SCANCODE_SPECIAL: u8 = 0xE0;

pub const SPECIAL_RETURN: u8 = 0x5A;
pub const SPECIAL_LEFT: u8 = 0x6B;
pub const SPECIAL_DOWN: u8 = 0x72;
pub const SPECIAL_RIGHT: u8 = 0x74;
pub const SPECIAL_UP: u8 = 0x75;

/// Keycodes in the Arduino `Keyboard.h` numbering
pub mod keycodes {
    pub const KEY_LEFT_CTRL: u8 = 0x80;
    pub const KEY_LEFT_SHIFT: u8 = 0x81;
    pub const KEY_LEFT_ALT: u8 = 0x82;
    pub const KEY_LEFT_GUI: u8 = 0x83;
    pub const KEY_RIGHT_SHIFT: u8 = 0x85;
    pub const KEY_RIGHT_GUI: u8 = 0x87;
    pub const KEY_RETURN: u8 = 0xB0;
    pub const KEY_ESC: u8 = 0xB1;
    pub const KEY_BACKSPACE: u8 = 0xB2;
    pub const KEY_TAB: u8 = 0xB3;
    pub const KEY_CAPS_LOCK: u8 = 0xC1;
    pub const KEY_F1: u8 = 0xC2;
    pub const KEY_F2: u8 = 0xC3;
    pub const KEY_F3: u8 = 0xC4;
    pub const KEY_F4: u8 = 0xC5;
    pub const KEY_F5: u8 = 0xC6;
    pub const KEY_F6: u8 = 0xC7;
    pub const KEY_F7: u8 = 0xC8;
    pub const KEY_F8: u8 = 0xC9;
    pub const KEY_F9: u8 = 0xCA;
    pub const KEY_F10: u8 = 0xCB;
    pub const KEY_F11: u8 = 0xCC;
    pub const KEY_F12: u8 = 0xCD;
    pub const KEY_UP_ARROW: u8 = 0xDA;
    pub const KEY_DOWN_ARROW: u8 = 0xD9;
    pub const KEY_LEFT_ARROW: u8 = 0xD8;
    pub const KEY_RIGHT_ARROW: u8 = 0xD7;
}

use keycodes::*;

/// One entry of the scancode table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyMapping {
    pub name: &'static str,
    /// 0 when the key has no keycode
    pub keycode: u8,
    /// Modifier-like keys that send an explicit release
    pub releasable: bool,
}

macro_rules! key {
    ($name:expr) => {
        KeyMapping {
            name: $name,
            keycode: 0,
            releasable: false,
        }
    };
    ($name:expr, $code:expr) => {
        KeyMapping {
            name: $name,
            keycode: $code,
            releasable: false,
        }
    };
    ($name:expr, $code:expr, releasable) => {
        KeyMapping {
            name: $name,
            keycode: $code,
            releasable: true,
        }
    };
}

pub const UNUSED: KeyMapping = key!("unused");

/// Rows are the low nibble, columns the high nibble 0x0-0x9
static KEY_TABLE: [[KeyMapping; 10]; 16] = [
    // x0h
    [
        UNUSED, UNUSED, UNUSED, UNUSED, UNUSED, UNUSED, UNUSED,
        key!("NUM-0", b'0'),
        key!("OpenX", KEY_LEFT_GUI, releasable),
        key!("90h"),
    ],
    // x1h
    [
        key!("F1", KEY_F1),
        key!("Alt", KEY_LEFT_ALT, releasable),
        key!("C", b'c'),
        key!("N", b'n'),
        key!(",<", b','),
        UNUSED,
        UNUSED,
        key!("NUM-.", b'.'),
        key!("ClosedX", KEY_RIGHT_GUI, releasable),
        key!("91h"),
    ],
    // x2h
    [
        key!("F2", KEY_F2),
        key!("LShft", KEY_LEFT_SHIFT, releasable),
        key!("X", b'x'),
        key!("B", b'b'),
        key!("K", b'k'),
        key!("\"'", b'\''),
        UNUSED,
        key!("NUM-2", b'2'),
        UNUSED,
        key!("92h"),
    ],
    // x3h
    [
        key!("F3", KEY_F3),
        UNUSED,
        key!("D", b'd'),
        key!("H", b'h'),
        key!("I", b'i'),
        UNUSED,
        UNUSED,
        key!("NUM-5", b'5'),
        UNUSED,
        key!("93h"),
    ],
    // x4h
    [
        key!("F4", KEY_F4),
        key!("LCtl", KEY_LEFT_CTRL, releasable),
        key!("E", b'e'),
        key!("G", b'g'),
        key!("O", b'o'),
        key!("[{", b'['),
        UNUSED,
        key!("NUM-6", b'6'),
        key!("NUM-SUB"),
        key!("94h"),
    ],
    // x5h
    [
        key!("F5", KEY_F5),
        key!("Q", b'q'),
        key!("4$", b'4'),
        key!("Y", b'y'),
        key!("0)", b'0'),
        key!("=+", b'='),
        UNUSED,
        key!("NUM-8", b'8'),
        UNUSED,
        key!("95h"),
    ],
    // x6h
    [
        key!("F6", KEY_F6),
        key!("1!", b'1'),
        key!("3#", b'3'),
        key!("6^", b'6'),
        key!("9(", b'9'),
        UNUSED,
        key!("BACKSPACE", KEY_BACKSPACE),
        key!("ESC", KEY_ESC),
        key!("JOY-A"),
        key!("96h"),
    ],
    // x7h
    [
        key!("F7", KEY_F7),
        UNUSED, UNUSED, UNUSED, UNUSED, UNUSED, UNUSED,
        key!("NUM-DIV"),
        key!("JOY-B"),
        key!("97h"),
    ],
    // x8h
    [
        key!("F8", KEY_F8),
        UNUSED, UNUSED, UNUSED, UNUSED,
        key!("CAPS", KEY_CAPS_LOCK, releasable),
        UNUSED,
        UNUSED,
        key!("JOY-X"),
        key!("98h"),
    ],
    // x9h
    [
        key!("F9", KEY_F9),
        UNUSED,
        key!("SPACE", b' '),
        UNUSED,
        key!(".>", b'.'),
        key!("RShft", KEY_RIGHT_SHIFT, releasable),
        key!("NUM-1", b'1'),
        key!("NUM-RET"),
        key!("JOY-Y"),
        key!("99h"),
    ],
    // xAh
    [
        key!("F10", KEY_F10),
        key!("Z", b'z'),
        key!("V", b'v'),
        key!("M", b'm'),
        key!("/?", b'/'),
        key!("ENTER", KEY_RETURN),
        UNUSED,
        key!("NUM-3", b'3'),
        key!("JOY-L"),
        key!("9Ah"),
    ],
    // xBh
    [
        key!("F11", KEY_F11),
        key!("S", b's'),
        key!("F", b'f'),
        key!("J", b'j'),
        key!("L", b'l'),
        key!("]}", b']'),
        key!("NUM-4", b'4'),
        UNUSED,
        key!("JOY-R"),
        key!("9Bh"),
    ],
    // xCh
    [
        key!("F12", KEY_F12),
        key!("A", b'a'),
        key!("T", b't'),
        key!("U", b'u'),
        key!(";:", b';'),
        UNUSED,
        key!("NUM-7", b'7'),
        key!("NUM-ADD", b'+'),
        key!("SELECT"),
        key!("9Ch"),
    ],
    // xDh
    [
        key!("Switch", KEY_TAB),
        key!("W", b'w'),
        key!("R", b'r'),
        key!("7&", b'7'),
        key!("P", b'p'),
        key!("\\", b'\\'),
        UNUSED,
        key!("NUM-9", b'9'),
        key!("START"),
        key!("9Dh"),
    ],
    // xEh
    [
        key!("`~", b'`'),
        key!("2@", b'2'),
        key!("5%", b'5'),
        key!("8*", b'8'),
        key!("-_", b'-'),
        UNUSED,
        UNUSED,
        key!("NUM-MUL", b'*'),
        key!("8Eh"),
        UNUSED,
    ],
    // xFh
    [
        UNUSED, UNUSED, UNUSED, UNUSED, UNUSED, UNUSED, UNUSED, UNUSED,
        key!("8Fh"),
        UNUSED,
    ],
];

/// Look up a scancode, `special` when it followed [`SCANCODE_SPECIAL`]
pub fn get_key_from_scancode(scancode: u8, special: bool) -> KeyMapping {
    if special {
        return match scancode {
            SPECIAL_RETURN => key!("JOY-A", KEY_RETURN, releasable),
            SPECIAL_LEFT => key!("LEFT", KEY_LEFT_ARROW, releasable),
            SPECIAL_DOWN => key!("DOWN", KEY_DOWN_ARROW, releasable),
            SPECIAL_RIGHT => key!("RIGHT", KEY_RIGHT_ARROW, releasable),
            SPECIAL_UP => key!("UP", KEY_UP_ARROW, releasable),
            _ => UNUSED,
        };
    }

    KEY_TABLE
        .get(usize::from(scancode & 0x0F))
        .and_then(|row| row.get(usize::from(scancode >> 4)))
        .copied()
        .unwrap_or(UNUSED)
}

/// Key transition decoded from the raw scancode stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyEvent {
    Pressed(KeyMapping),
    Released(KeyMapping),
}

/// Tracks release/special prefixes across scancodes, also across polls
#[derive(Debug, Clone, Default)]
pub struct ScancodeDecoder {
    release_pending: bool,
    special_pending: bool,
}

impl ScancodeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw scancode, prefixes yield nothing
    pub fn feed(&mut self, scancode: u8) -> Option<KeyEvent> {
        match scancode {
            SCANCODE_RELEASE => {
                self.release_pending = true;
                None
            }
            SCANCODE_SPECIAL => {
                self.special_pending = true;
                None
            }
            code => {
                let key = get_key_from_scancode(code, self.special_pending);
                let event = if self.release_pending {
                    KeyEvent::Released(key)
                } else {
                    KeyEvent::Pressed(key)
                };
                self.release_pending = false;
                self.special_pending = false;
                Some(event)
            }
        }
    }

    pub fn feed_all(&mut self, scancodes: &[u8]) -> Vec<KeyEvent> {
        scancodes.iter().filter_map(|&code| self.feed(code)).collect()
    }
}
