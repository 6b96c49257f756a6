//! Bus transport for the SNES controller port
//!
//! Generates the latch and clock signalling for one read cycle and samples the
//! two data lines. The I/O bit is driven for keyboard commands and, once a
//! rumble frame is active, for motor data on every clock edge.
//!
//! # Signal flow
//!
//! ```text
//! latch  ─┐ 12µs ┌──────────────────────────────────────────────
//!         └──────┘
//! clock  ────────────┐ 12µs ┌──┐ 12µs ┌── ... (16 or 32 bits, then keyboard dibits)
//!                    └──────┘  └──────┘
//! data0  sampled while clock is low
//! iobit  rumble bit written right before each falling clock edge
//! ```
//!
//! The physical pins are reached through the [`PadIo`] trait so the same
//! transport drives real GPIO ([`RppalIo`]) or the in-memory [`SimulatedBus`].

pub mod rppal_io;
pub mod rumble;
pub mod sim;

pub use rppal_io::RppalIo;
pub use rumble::RumbleFrame;
pub use sim::{SimDevice, SimKeyboard, SimMouse, SimulatedBus};

use crate::error::PadError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Direction and bias a pin is configured with during `begin()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinMode {
    Output,
    /// Input with the internal pull-up enabled, an empty port reads high
    InputPullUp,
}

/// Platform primitives the transport needs from the embedding system
///
/// Implementations must not reorder or coalesce calls: the controller firmware
/// relies on the exact sequence of edges and delays.
pub trait PadIo {
    /// Called once per pin from `begin()`
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), PadError>;

    /// Drive an output pin
    fn write(&mut self, pin: u8, level: bool);

    /// Sample an input pin
    fn read(&mut self, pin: u8) -> bool;

    /// Blocking busy-wait
    fn delay_us(&mut self, us: u32);
}

/// The five pins of one controller port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusPins {
    pub clock: u8,
    pub latch: u8,
    pub data0: u8,
    pub data1: u8,
    pub iobit: u8,
}

impl BusPins {
    pub fn new(clock: u8, latch: u8, data0: u8, data1: u8, iobit: u8) -> Self {
        Self {
            clock,
            latch,
            data0,
            data1,
            iobit,
        }
    }
}

impl Default for BusPins {
    fn default() -> Self {
        Self::new(2, 3, 4, 5, 6)
    }
}

/// Delays used while clocking the bus, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTiming {
    /// Hold time after raising and after dropping latch
    pub settle_us: u32,
    /// Dwell on each clock phase
    pub clock_half_period_us: u32,
    /// Low phase of the mouse speed-cycle pulse
    pub speed_pulse_us: u32,
}

impl Default for BusTiming {
    fn default() -> Self {
        Self {
            settle_us: 12,
            clock_half_period_us: 12,
            speed_pulse_us: 6,
        }
    }
}

/// Drives one controller port
pub struct Transport {
    io: Box<dyn PadIo + Send>,
    pins: BusPins,
    timing: BusTiming,
    rumble: RumbleFrame,
}

impl Transport {
    pub fn new(io: Box<dyn PadIo + Send>, pins: BusPins, timing: BusTiming) -> Self {
        Self {
            io,
            pins,
            timing,
            rumble: RumbleFrame::default(),
        }
    }

    pub fn pins(&self) -> BusPins {
        self.pins
    }

    pub fn timing(&self) -> BusTiming {
        self.timing
    }

    pub fn rumble(&self) -> &RumbleFrame {
        &self.rumble
    }

    pub fn rumble_mut(&mut self) -> &mut RumbleFrame {
        &mut self.rumble
    }

    /// Clock, latch and I/O bit become outputs, both data lines inputs with pull-up
    pub fn configure_pins(&mut self) -> Result<(), PadError> {
        let pins = self.pins;
        let layout = [
            (pins.clock, PinMode::Output),
            (pins.latch, PinMode::Output),
            (pins.data0, PinMode::InputPullUp),
            (pins.data1, PinMode::InputPullUp),
            (pins.iobit, PinMode::Output),
        ];

        for (pin, mode) in layout {
            debug!("Configuring pin {} as {:?}", pin, mode);
            self.io.configure(pin, mode)?;
        }
        Ok(())
    }

    /// Level of a data line outside of any clock train
    pub fn sample(&mut self, pin: u8) -> bool {
        self.io.read(pin)
    }

    /// Latch pulse, optionally carrying the mouse speed-cycle request
    ///
    /// The speed request is a short clock pulse while latch is still high.
    pub fn latch_and_prime(&mut self, request_speed_cycle: bool) {
        let pins = self.pins;

        self.io.write(pins.latch, true);
        self.io.delay_us(self.timing.settle_us);

        if request_speed_cycle {
            self.io.write(pins.clock, false);
            self.io.delay_us(self.timing.speed_pulse_us);

            self.io.write(pins.clock, true);
            self.io.delay_us(self.timing.clock_half_period_us);
        }

        self.io.write(pins.latch, false);
        self.io.delay_us(self.timing.settle_us);
    }

    /// One clock pulse sampling `data_pin`, returns 0 or 1
    ///
    /// With an active rumble frame the next frame bit is put on the I/O bit
    /// before the clock falls.
    pub fn shift_bit(&mut self, data_pin: u8) -> u32 {
        let pins = self.pins;

        if let Some(level) = self.rumble.next_bit() {
            self.io.write(pins.iobit, level);
        }

        self.io.write(pins.clock, false);
        self.io.delay_us(self.timing.clock_half_period_us);

        let bit = self.io.read(data_pin);

        self.io.write(pins.clock, true);
        self.io.delay_us(self.timing.clock_half_period_us);

        u32::from(bit)
    }

    /// One clock pulse sampling both data lines, returns `data0 | data1 << 1`
    pub fn shift_dibit(&mut self) -> u8 {
        let pins = self.pins;

        self.io.write(pins.clock, false);
        self.io.delay_us(self.timing.clock_half_period_us);

        let bits = u8::from(self.io.read(pins.data0)) | (u8::from(self.io.read(pins.data1)) << 1);

        self.io.write(pins.clock, true);
        self.io.delay_us(self.timing.clock_half_period_us);

        bits
    }

    pub fn set_iobit(&mut self, level: bool) {
        self.io.write(self.pins.iobit, level);
    }

    /// Extra half clock period, inserted before the extended mouse bits
    pub fn settle(&mut self) {
        self.io.delay_us(self.timing.clock_half_period_us);
    }
}
