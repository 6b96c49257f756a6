//! In-memory controller port
//!
//! Plays the device side of the protocol so the driver can run without
//! hardware: a SNES pad, an NES pad, a SNES mouse, an XBAND keyboard, an
//! arbitrary raw frame, or nothing at all. The bus is cheap to clone; all
//! clones share one port, so a test can keep a clone to swap devices or
//! inspect the wire while the pad owns the other.

use super::{BusPins, PadIo, PinMode};
use crate::error::PadError;
use crate::pad::device::{reverse_byte, MouseSpeed, KEYBOARD_ID, MOUSE_ID};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// SNES mouse as seen from the port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMouse {
    /// Left button
    pub primary: bool,
    /// Right button
    pub secondary: bool,
    /// Signed motion counts, magnitude is limited to 7 bits
    pub dx: i8,
    pub dy: i8,
    pub speed: MouseSpeed,
    /// A Hyperkin-style mouse ignores speed-cycle requests
    pub honours_speed_requests: bool,
}

impl Default for SimMouse {
    fn default() -> Self {
        Self {
            primary: false,
            secondary: false,
            dx: 0,
            dy: 0,
            speed: MouseSpeed::Slow,
            honours_speed_requests: true,
        }
    }
}

impl SimMouse {
    /// Inverted (active-high) 32-bit report
    fn report(&self) -> u32 {
        let mut word = u32::from(MOUSE_ID) << 12;
        word |= u32::from(self.speed as u8) << 10;
        word |= u32::from(self.primary) << 9;
        word |= u32::from(self.secondary) << 8;
        word |= u32::from(self.dy < 0) << 16;
        word |= u32::from(wire_magnitude(self.dy)) << 17;
        word |= u32::from(self.dx < 0) << 24;
        word |= u32::from(wire_magnitude(self.dx)) << 25;
        word
    }
}

/// The mouse sends its 7-bit magnitude MSB first, which lands reversed in
/// an LSB-first shift register
fn wire_magnitude(delta: i8) -> u8 {
    reverse_byte(delta.unsigned_abs() & 0x7F) >> 1
}

/// XBAND keyboard as seen from the port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimKeyboard {
    id: u8,
    pending: Vec<u8>,
    raw: Option<Vec<u8>>,
}

impl Default for SimKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKeyboard {
    pub fn new() -> Self {
        Self::with_id(KEYBOARD_ID)
    }

    /// Keyboard answering with a custom signature byte
    pub fn with_id(id: u8) -> Self {
        Self {
            id,
            pending: Vec::new(),
            raw: None,
        }
    }

    /// Keyboard that replays exactly these dibits on every transfer
    pub fn from_dibits(dibits: Vec<u8>) -> Self {
        Self {
            id: KEYBOARD_ID,
            pending: Vec::new(),
            raw: Some(dibits),
        }
    }

    /// Queue scancodes for the next transfers, at most 15 go out per transfer
    pub fn queue(&mut self, scancodes: &[u8]) {
        self.pending.extend_from_slice(scancodes);
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    fn transfer(&mut self) -> Vec<u8> {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }

        let count = self.pending.len().min(15);
        let batch: Vec<u8> = self.pending.drain(..count).collect();

        let mut dibits = byte_dibits(self.id).to_vec();
        dibits.push(count as u8 & 0b11);
        dibits.push((count as u8 >> 2) & 0b11);
        for code in batch {
            dibits.extend_from_slice(&byte_dibits(code));
        }
        dibits
    }
}

fn byte_dibits(byte: u8) -> [u8; 4] {
    [byte & 0b11, (byte >> 2) & 0b11, (byte >> 4) & 0b11, (byte >> 6) & 0b11]
}

/// Whatever is plugged into the simulated port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimDevice {
    Disconnected,
    /// SNES pad, bits set in `pressed` use the SNES button masks
    Controller { pressed: u16 },
    /// NES pad, bits set in `pressed` use the low byte SNES layout (A at bit 0, B at bit 1)
    Nes { pressed: u8 },
    Mouse(SimMouse),
    Keyboard(SimKeyboard),
    /// Raw 32-bit frame as driven on data0 (active-low), plus the idle data0 level
    Raw { frame: u32, idle_level: bool },
}

impl SimDevice {
    /// Raw data0 frame and its length in bits
    fn frame(&self) -> (u32, u32) {
        match self {
            SimDevice::Disconnected => (u32::MAX, 32),
            SimDevice::Controller { pressed } => (!u32::from(*pressed & 0x0FFF) & 0xFFFF, 16),
            SimDevice::Nes { pressed } => (!u32::from(*pressed) & 0xFF, 32),
            SimDevice::Mouse(mouse) => (!mouse.report(), 32),
            SimDevice::Keyboard(_) => (0xFFFF, 16),
            SimDevice::Raw { frame, .. } => (*frame, 32),
        }
    }

    /// data0 outside of a frame, pads pull it low
    fn idle_level(&self) -> bool {
        match self {
            SimDevice::Disconnected | SimDevice::Keyboard(_) => true,
            SimDevice::Controller { .. } | SimDevice::Nes { .. } | SimDevice::Mouse(_) => false,
            SimDevice::Raw { idle_level, .. } => *idle_level,
        }
    }
}

#[derive(Debug)]
struct SimPort {
    pins: BusPins,
    device: SimDevice,
    modes: HashMap<u8, PinMode>,
    clock: bool,
    latch: bool,
    iobit: bool,
    frame: u32,
    frame_len: u32,
    bit_index: u32,
    keyboard_stream: Option<Vec<u8>>,
    dibit_index: usize,
    speed_requests: u32,
    iobit_writes: Vec<bool>,
    elapsed_us: u64,
}

impl SimPort {
    fn write(&mut self, pin: u8, level: bool) {
        if pin == self.pins.latch {
            self.write_latch(level);
        } else if pin == self.pins.clock {
            self.write_clock(level);
        } else if pin == self.pins.iobit {
            self.write_iobit(level);
        } else {
            trace!("Simulated write to unused pin {}", pin);
        }
    }

    fn write_latch(&mut self, level: bool) {
        if self.latch && !level {
            let (frame, len) = self.device.frame();
            self.frame = frame;
            self.frame_len = len;
            self.bit_index = 0;
            self.keyboard_stream = None;
            self.dibit_index = 0;
        }
        self.latch = level;
    }

    fn write_clock(&mut self, level: bool) {
        if self.latch && self.clock && !level {
            self.speed_requests += 1;
            if let SimDevice::Mouse(mouse) = &mut self.device {
                if mouse.honours_speed_requests {
                    mouse.speed = mouse.speed.next();
                }
            }
        }

        if !self.latch && !self.clock && level {
            if self.keyboard_stream.is_some() {
                self.dibit_index += 1;
            } else {
                self.bit_index = self.bit_index.saturating_add(1);
            }
        }
        self.clock = level;
    }

    fn write_iobit(&mut self, level: bool) {
        self.iobit_writes.push(level);

        if self.iobit && !level {
            if let SimDevice::Keyboard(keyboard) = &mut self.device {
                self.keyboard_stream = Some(keyboard.transfer());
                self.dibit_index = 0;
            }
        }
        self.iobit = level;
    }

    fn current_dibit(&self) -> Option<u8> {
        self.keyboard_stream
            .as_ref()
            .map(|stream| stream.get(self.dibit_index).copied().unwrap_or(0b11))
    }

    fn read(&self, pin: u8) -> bool {
        if pin == self.pins.data0 {
            if let Some(dibit) = self.current_dibit() {
                return dibit & 0b01 != 0;
            }
            if self.bit_index < self.frame_len {
                return (self.frame >> self.bit_index) & 1 == 1;
            }
            self.device.idle_level()
        } else if pin == self.pins.data1 {
            self.current_dibit().map_or(true, |dibit| dibit & 0b10 != 0)
        } else {
            true
        }
    }
}

/// Shared, cloneable simulated port
#[derive(Debug, Clone)]
pub struct SimulatedBus {
    port: Arc<Mutex<SimPort>>,
}

impl SimulatedBus {
    pub fn new(pins: BusPins) -> Self {
        Self {
            port: Arc::new(Mutex::new(SimPort {
                pins,
                device: SimDevice::Disconnected,
                modes: HashMap::new(),
                clock: true,
                latch: false,
                iobit: true,
                frame: u32::MAX,
                frame_len: 0,
                bit_index: 0,
                keyboard_stream: None,
                dibit_index: 0,
                speed_requests: 0,
                iobit_writes: Vec::new(),
                elapsed_us: 0,
            })),
        }
    }

    pub fn with_device(pins: BusPins, device: SimDevice) -> Self {
        let bus = Self::new(pins);
        bus.attach(device);
        bus
    }

    fn port(&self) -> MutexGuard<'_, SimPort> {
        self.port.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Plug a device in, replacing whatever was there
    pub fn attach(&self, device: SimDevice) {
        self.port().device = device;
    }

    pub fn detach(&self) {
        self.attach(SimDevice::Disconnected);
    }

    pub fn device(&self) -> SimDevice {
        self.port().device.clone()
    }

    /// Edit the attached device in place
    pub fn update<F: FnOnce(&mut SimDevice)>(&self, f: F) {
        f(&mut self.port().device);
    }

    pub fn pin_mode(&self, pin: u8) -> Option<PinMode> {
        self.port().modes.get(&pin).copied()
    }

    /// Clock pulses seen while latch was high
    pub fn speed_requests(&self) -> u32 {
        self.port().speed_requests
    }

    /// Every level written to the I/O bit so far
    pub fn iobit_writes(&self) -> Vec<bool> {
        self.port().iobit_writes.clone()
    }

    pub fn clear_iobit_writes(&self) {
        self.port().iobit_writes.clear();
    }

    /// Sum of all requested delays
    pub fn elapsed_us(&self) -> u64 {
        self.port().elapsed_us
    }
}

impl PadIo for SimulatedBus {
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), PadError> {
        self.port().modes.insert(pin, mode);
        Ok(())
    }

    fn write(&mut self, pin: u8, level: bool) {
        self.port().write(pin, level);
    }

    fn read(&mut self, pin: u8) -> bool {
        self.port().read(pin)
    }

    fn delay_us(&mut self, us: u32) {
        self.port().elapsed_us += u64::from(us);
    }
}
