//! Rumble frame shifted out on the I/O bit
//!
//! Frame layout: `0x72` header in the high byte, right motor nibble then left
//! motor nibble in the low byte. Bits go out MSB first, one per data clock,
//! and the frame repeats until new intensities are set.

/// Magic header of a rumble frame
pub const RUMBLE_HEADER: u16 = 0x7200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RumbleFrame {
    left: u8,
    right: u8,
    frame: u16,
    cursor: u8,
    active: bool,
}

impl Default for RumbleFrame {
    fn default() -> Self {
        Self {
            left: 0,
            right: 0,
            frame: 0,
            cursor: 15,
            active: false,
        }
    }
}

impl RumbleFrame {
    /// Set motor intensities from 0-255 inputs, returns whether the frame changed
    ///
    /// Only the top four bits of each input are kept. Repeating the stored
    /// values leaves the cursor where it is so a frame in flight is not cut.
    /// Once active the frame is never deactivated, a 0/0 update keeps
    /// shifting an all-off frame.
    pub fn set(&mut self, left: u8, right: u8) -> bool {
        let left = left >> 4;
        let right = right >> 4;

        if left == self.left && right == self.right {
            return false;
        }

        self.left = left;
        self.right = right;
        self.frame = RUMBLE_HEADER | (u16::from(right) << 4) | u16::from(left);
        self.cursor = 15;
        self.active = true;
        true
    }

    /// Next outbound bit, `None` while no frame was ever set
    pub fn next_bit(&mut self) -> Option<bool> {
        if !self.active {
            return None;
        }

        let bit = (self.frame >> self.cursor) & 1 == 1;
        self.cursor = if self.cursor == 0 { 15 } else { self.cursor - 1 };
        Some(bit)
    }

    pub fn left(&self) -> u8 {
        self.left
    }

    pub fn right(&self) -> u8 {
        self.right
    }

    pub fn frame(&self) -> u16 {
        self.frame
    }

    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
