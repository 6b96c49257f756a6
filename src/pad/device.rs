//! Device types and per-device report layouts
//!
//! All masks apply to the inverted (active-high) word returned by a read.

use serde::{Deserialize, Serialize};

pub const SNES_B: u32 = 0x0001;
pub const SNES_Y: u32 = 0x0002;
pub const SNES_SELECT: u32 = 0x0004;
pub const SNES_START: u32 = 0x0008;
pub const SNES_UP: u32 = 0x0010;
pub const SNES_DOWN: u32 = 0x0020;
pub const SNES_LEFT: u32 = 0x0040;
pub const SNES_RIGHT: u32 = 0x0080;
pub const SNES_A: u32 = 0x0100;
pub const SNES_X: u32 = 0x0200;
pub const SNES_L: u32 = 0x0400;
pub const SNES_R: u32 = 0x0800;
pub const SNES_DEVICE_ID: u32 = 0xF000;

pub const MOUSE_SPEED: u32 = 0x0C00;
pub const MOUSE_Y_SIGN: u32 = 0x0001_0000;
pub const MOUSE_Y: u32 = 0x00FE_0000;
pub const MOUSE_X_SIGN: u32 = 0x0100_0000;
pub const MOUSE_X: u32 = 0xFE00_0000;

/// Device ID nibble of a SNES pad
pub const PAD_ID: u8 = 0x00;
/// Device ID nibble of a SNES mouse
pub const MOUSE_ID: u8 = 0x08;
/// Signature byte of the XBAND keyboard
pub const KEYBOARD_ID: u8 = 0x78;

/// Resting mouse coordinate
pub const MOUSE_CENTER: i32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    None,
    Controller,
    Nes,
    Mouse,
    Keyboard,
}

/// Reported mouse sensitivity, numbered the way the mouse encodes it
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouseSpeed {
    #[default]
    Slow = 0,
    Fast = 1,
    Medium = 2,
}

impl MouseSpeed {
    /// Decode the two speed bits, the unused value 3 reads as slow
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            1 => MouseSpeed::Fast,
            2 => MouseSpeed::Medium,
            _ => MouseSpeed::Slow,
        }
    }

    /// Speed after one speed-cycle request
    pub fn next(self) -> Self {
        match self {
            MouseSpeed::Slow => MouseSpeed::Medium,
            MouseSpeed::Medium => MouseSpeed::Fast,
            MouseSpeed::Fast => MouseSpeed::Slow,
        }
    }
}

/// Directions and buttons of a SNES or NES pad
///
/// NES pads only ever set the directions, Select, Start, A and B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l: bool,
    pub r: bool,
    pub start: bool,
    pub select: bool,
}

impl ControllerState {
    pub fn from_snes(word: u32) -> Self {
        Self {
            up: word & SNES_UP != 0,
            down: word & SNES_DOWN != 0,
            left: word & SNES_LEFT != 0,
            right: word & SNES_RIGHT != 0,
            a: word & SNES_A != 0,
            b: word & SNES_B != 0,
            x: word & SNES_X != 0,
            y: word & SNES_Y != 0,
            l: word & SNES_L != 0,
            r: word & SNES_R != 0,
            start: word & SNES_START != 0,
            select: word & SNES_SELECT != 0,
        }
    }

    /// Update from an NES report
    ///
    /// X, Y, L and R keep whatever they held before.
    pub fn apply_nes(&mut self, word: u32) {
        self.up = word & SNES_UP != 0;
        self.down = word & SNES_DOWN != 0;
        self.left = word & SNES_LEFT != 0;
        self.right = word & SNES_RIGHT != 0;
        self.select = word & SNES_SELECT != 0;
        self.start = word & SNES_START != 0;
        // NES B sits where SNES Y is, NES A where SNES B is
        self.b = word & SNES_Y != 0;
        self.a = word & SNES_B != 0;
    }

    /// True if any direction or button is held
    pub fn any(&self) -> bool {
        *self != Self::default()
    }
}

/// Mouse report, coordinates re-centred on [`MOUSE_CENTER`] every poll
///
/// `x` and `y` are the last relative movement expressed around the centre,
/// not an accumulated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseState {
    pub x: i32,
    pub y: i32,
    /// Left button
    pub primary: bool,
    /// Right button
    pub secondary: bool,
    pub speed: MouseSpeed,
    /// Polls where a requested speed change did not happen
    pub speed_fails: u8,
}

impl Default for MouseState {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            primary: false,
            secondary: false,
            speed: MouseSpeed::Slow,
            speed_fails: 0,
        }
    }
}

impl MouseState {
    /// Movement and buttons from a mouse report
    pub fn apply_report(&mut self, word: u32, precision: i16) {
        let x_field = ((word & MOUSE_X) >> 25) as u8;
        let y_field = ((word & MOUSE_Y) >> 17) as u8;

        self.x = mouse_axis(reverse_byte(x_field), word & MOUSE_X_SIGN != 0, precision);
        self.y = mouse_axis(reverse_byte(y_field), word & MOUSE_Y_SIGN != 0, precision);
        self.secondary = word & SNES_A != 0;
        self.primary = word & SNES_X != 0;
    }

    /// Track the reported speed, counting polls where it got stuck below fast
    pub fn update_speed(&mut self, word: u32, threshold: u8) {
        let last = self.speed;
        self.speed = MouseSpeed::from_bits(((word & MOUSE_SPEED) >> 10) as u8);

        if self.speed != MouseSpeed::Fast && self.speed == last && self.speed_fails < threshold {
            self.speed_fails += 1;
        }
    }

    pub fn reset_speed(&mut self) {
        self.speed = MouseSpeed::Slow;
        self.speed_fails = 0;
    }
}

/// Coordinate for one axis: centre plus or minus the scaled magnitude
///
/// Computed in `i32`: the largest magnitude times any `i16` precision fits.
pub fn mouse_axis(magnitude: u8, negative: bool, precision: i16) -> i32 {
    let delta = i32::from(magnitude) * i32::from(precision);
    if negative {
        MOUSE_CENTER - delta
    } else {
        MOUSE_CENTER + delta
    }
}

/// Reverse the bit order of a whole byte
///
/// A 7-bit field is reversed as a byte as well, its implicit leading zero
/// ends up as bit 0.
pub fn reverse_byte(byte: u8) -> u8 {
    let mut value = byte;
    let mut reversed = 0u8;
    for _ in 0..8 {
        reversed = (reversed << 1) | (value & 1);
        value >>= 1;
    }
    reversed
}

/// Device ID nibble of an inverted word
pub fn device_id(word: u32) -> u8 {
    ((word & SNES_DEVICE_ID) >> 12) as u8
}

pub fn is_snes_pad(word: u32) -> bool {
    device_id(word) == PAD_ID
}

pub fn is_mouse(word: u32) -> bool {
    device_id(word) == MOUSE_ID
}

/// NES pads stop driving the line after 8 bits, so bits 8-15 read as all ones
pub fn is_nes(word: u32) -> bool {
    !word != 0 && (word >> 8) & 0xFF == 0xFF
}

/// Snapshot of the port, one variant per device type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PadReport {
    #[default]
    None,
    Controller(ControllerState),
    Nes(ControllerState),
    Mouse(MouseState),
    Keyboard { scancodes: Vec<u8> },
}

impl PadReport {
    pub fn device_type(&self) -> DeviceType {
        match self {
            PadReport::None => DeviceType::None,
            PadReport::Controller(_) => DeviceType::Controller,
            PadReport::Nes(_) => DeviceType::Nes,
            PadReport::Mouse(_) => DeviceType::Mouse,
            PadReport::Keyboard { .. } => DeviceType::Keyboard,
        }
    }
}
