//! XBAND keyboard sub-protocol
//!
//! The keyboard answers on both data lines at once, two bits per clock, after
//! the host pulls the I/O bit low:
//!
//! ```text
//! iobit ──┐                              ┌─ (caps toggle edge)          ┌──
//!         └──────────────────────────────┘                              │
//! dibits   [ id: 4 clocks ] [ count: 2 clocks ] [ count x 4 clocks of scancodes ]
//! ```

use super::device::{DeviceType, KEYBOARD_ID};
use crate::bus::Transport;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Most scancodes a single transfer can announce
pub const MAX_SCANCODES: usize = 16;

/// Scancodes received in the last transfer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyboardState {
    scancodes: [u8; MAX_SCANCODES],
    len: u8,
    /// Whether the last transfer carried the keyboard signature
    valid: bool,
}

impl KeyboardState {
    /// Raw scancodes of the last poll, prefixes included
    pub fn scancodes(&self) -> &[u8] {
        &self.scancodes[..usize::from(self.len)]
    }

    /// Scancodes actually read, 0 when the signature did not match even if
    /// the keyboard announced a count
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    fn clear(&mut self) {
        self.scancodes = [0; MAX_SCANCODES];
        self.len = 0;
    }
}

/// Shift four dibits into a byte, LSB first
fn shift_byte(transport: &mut Transport) -> u8 {
    (0..8)
        .step_by(2)
        .fold(0u8, |byte, shift| byte | (transport.shift_dibit() << shift))
}

/// Run one keyboard transfer, returns whether the keyboard signature matched
///
/// `was_keyboard` enables tolerance for the off-by-one signature some
/// keyboards send mid-session. With `caps_locked` the I/O bit stays low
/// through the count so the LED does not toggle. `readonly_id` raises the
/// I/O bit after the first dibit which stops the keyboard before any
/// scancodes are sent.
pub fn read_keyboard(
    transport: &mut Transport,
    state: &mut KeyboardState,
    was_keyboard: bool,
    caps_locked: bool,
    readonly_id: bool,
) -> bool {
    let mut id = 0u8;

    // Wake the keyboard's host interrupt
    transport.set_iobit(false);

    for shift in (0..8).step_by(2) {
        id |= transport.shift_dibit() << shift;

        if shift == 0 && readonly_id {
            transport.set_iobit(true);
        }

        // A transfer that slipped by one dibit shows the signature shifted right
        if shift == 4 && id == KEYBOARD_ID >> 2 {
            debug!("Recovered shifted keyboard signature");
            id <<= 2;
            break;
        }
    }

    if !caps_locked {
        transport.set_iobit(true);
    }

    let count = (transport.shift_dibit() | (transport.shift_dibit() << 2)) & 0x0F;

    if was_keyboard && id == KEYBOARD_ID.wrapping_add(1) {
        id = KEYBOARD_ID;
    }

    state.clear();
    if !readonly_id && count != 0 && id == KEYBOARD_ID {
        for slot in state.scancodes.iter_mut().take(usize::from(count)) {
            *slot = shift_byte(transport);
        }
        state.len = count;
    }

    transport.set_iobit(true);
    state.valid = id == KEYBOARD_ID;

    debug!("Keyboard id: {:#04X}, scancodes: {}", id, count);
    state.valid
}

/// Convenience wrapper used by the decoder
pub(crate) fn probe(
    transport: &mut Transport,
    state: &mut KeyboardState,
    previous: DeviceType,
    caps_locked: bool,
) -> bool {
    read_keyboard(
        transport,
        state,
        previous == DeviceType::Keyboard,
        caps_locked,
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusPins, BusTiming, SimDevice, SimKeyboard, SimulatedBus};

    fn transport_with(keyboard: SimKeyboard) -> (Transport, SimulatedBus) {
        let bus = SimulatedBus::with_device(BusPins::default(), SimDevice::Keyboard(keyboard));
        let transport = Transport::new(Box::new(bus.clone()), BusPins::default(), BusTiming::default());
        (transport, bus)
    }

    fn start_cycle(transport: &mut Transport) {
        transport.latch_and_prime(false);
        for _ in 0..16 {
            transport.shift_bit(transport.pins().data0);
        }
    }

    #[test]
    fn reads_queued_scancodes() {
        let mut keyboard = SimKeyboard::new();
        keyboard.queue(&[0x1C, 0xF0, 0x1C]);
        let (mut transport, _bus) = transport_with(keyboard);
        let mut state = KeyboardState::default();

        start_cycle(&mut transport);
        assert!(read_keyboard(&mut transport, &mut state, false, false, false));
        assert_eq!(state.scancodes(), &[0x1C, 0xF0, 0x1C]);
        assert!(state.is_valid());
    }

    #[test]
    fn wrong_signature_drops_payload() {
        let mut keyboard = SimKeyboard::with_id(0x55);
        keyboard.queue(&[0x1C]);
        let (mut transport, _bus) = transport_with(keyboard);
        let mut state = KeyboardState::default();

        start_cycle(&mut transport);
        assert!(!read_keyboard(&mut transport, &mut state, false, false, false));
        assert!(state.is_empty());
        assert_eq!(state.len(), 0);
        assert!(!state.is_valid());
    }

    #[test]
    fn off_by_one_signature_needs_tracked_keyboard() {
        let mut keyboard = SimKeyboard::with_id(KEYBOARD_ID + 1);
        keyboard.queue(&[0x1C]);
        let (mut transport, bus) = transport_with(keyboard);
        let mut state = KeyboardState::default();

        start_cycle(&mut transport);
        assert!(!read_keyboard(&mut transport, &mut state, false, false, false));

        bus.update(|device| {
            if let SimDevice::Keyboard(keyboard) = device {
                keyboard.queue(&[0x2A]);
            }
        });
        start_cycle(&mut transport);
        assert!(read_keyboard(&mut transport, &mut state, true, false, false));
        assert_eq!(state.scancodes(), &[0x2A]);
    }

    #[test]
    fn shifted_signature_recovers_after_three_dibits() {
        // 0x1E arrives in three dibits, then count 2 and two scancodes
        let mut dibits = vec![0b10, 0b11, 0b01];
        dibits.extend([0b10, 0b00]);
        dibits.extend([0b00, 0b11, 0b01, 0b00]); // 0x1C
        dibits.extend([0b10, 0b10, 0b10, 0b00]); // 0x2A
        let (mut transport, bus) = transport_with(SimKeyboard::from_dibits(dibits));
        let mut state = KeyboardState::default();

        start_cycle(&mut transport);
        bus.clear_iobit_writes();
        assert!(read_keyboard(&mut transport, &mut state, false, false, false));
        assert_eq!(state.scancodes(), &[0x1C, 0x2A]);
    }

    #[test]
    fn caps_lock_holds_iobit_low() {
        let (mut transport, bus) = transport_with(SimKeyboard::new());
        let mut state = KeyboardState::default();

        start_cycle(&mut transport);
        bus.clear_iobit_writes();
        read_keyboard(&mut transport, &mut state, false, false, false);
        assert_eq!(bus.iobit_writes(), vec![false, true, true]);

        start_cycle(&mut transport);
        bus.clear_iobit_writes();
        read_keyboard(&mut transport, &mut state, false, true, false);
        assert_eq!(bus.iobit_writes(), vec![false, true]);
    }

    #[test]
    fn readonly_id_skips_payload() {
        let mut keyboard = SimKeyboard::new();
        keyboard.queue(&[0x1C]);
        let (mut transport, bus) = transport_with(keyboard);
        let mut state = KeyboardState::default();

        start_cycle(&mut transport);
        bus.clear_iobit_writes();
        assert!(read_keyboard(&mut transport, &mut state, false, false, true));
        assert!(state.is_empty());
        assert_eq!(bus.iobit_writes()[..2], [false, true]);
    }
}
