//! Protocol decoder for one controller port
//!
//! `SnesPad` is a statum state machine with two compile-time states:
//!
//! ```text
//! Uninitialized ──begin()──► Ready
//! ```
//!
//! While `Ready` the pad moves between detecting and tracking at runtime,
//! driven only by what the bus returns:
//!
//! ```text
//!            start() finds a device
//! Detecting ───────────────────────► Tracking(type)
//!     ▲                                    │
//!     └──── empty read or unknown id ──────┘
//! ```

use super::device::{
    is_mouse, is_nes, is_snes_pad, ControllerState, DeviceType, MouseSpeed, MouseState, PadReport,
};
use super::keyboard::{self, KeyboardState};
use crate::bus::{BusPins, BusTiming, PadIo, RumbleFrame, Transport};
use crate::error::PadError;
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use tracing::{debug, info, warn};

/// Tunables for the decoder and the bus timing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadSettings {
    /// Multiplier applied to mouse movement
    pub mouse_precision: i16,
    /// Stagnant speed readings before speed cycling is given up
    pub mouse_speed_fail_threshold: u8,
    pub settle_us: u32,
    pub clock_half_period_us: u32,
    pub speed_pulse_us: u32,
}

impl Default for PadSettings {
    fn default() -> Self {
        Self {
            mouse_precision: 1,
            // Hyperkin mice never change speed
            mouse_speed_fail_threshold: 10,
            settle_us: 12,
            clock_half_period_us: 12,
            speed_pulse_us: 6,
        }
    }
}

impl PadSettings {
    pub fn timing(&self) -> BusTiming {
        BusTiming {
            settle_us: self.settle_us,
            clock_half_period_us: self.clock_half_period_us,
            speed_pulse_us: self.speed_pulse_us,
        }
    }
}

/// Runtime phase of a ready pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Detecting,
    Tracking(DeviceType),
}

#[state]
#[derive(Debug, Clone)]
pub enum PadState {
    Uninitialized, // pins stored, GPIO untouched
    Ready,         // pins configured, polling allowed
}

#[machine]
pub struct SnesPad<S: PadState> {
    transport: Transport,
    settings: PadSettings,
    device: DeviceType,
    controller: ControllerState,
    mouse: MouseState,
    keyboard: KeyboardState,
    caps_locked: bool,
    last_read: u32,
}

impl<S: PadState> SnesPad<S> {
    pub fn device_type(&self) -> DeviceType {
        self.device
    }

    pub fn phase(&self) -> Phase {
        match self.device {
            DeviceType::None => Phase::Detecting,
            device => Phase::Tracking(device),
        }
    }

    /// Directions and buttons, meaningless while the device type is `None`
    pub fn controller(&self) -> &ControllerState {
        &self.controller
    }

    pub fn mouse(&self) -> &MouseState {
        &self.mouse
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    pub fn scancodes(&self) -> &[u8] {
        self.keyboard.scancodes()
    }

    pub fn caps_locked(&self) -> bool {
        self.caps_locked
    }

    /// Keep the I/O bit low through the keyboard count so the caps LED holds
    pub fn set_caps_lock_led(&mut self, enabled: bool) {
        self.caps_locked = enabled;
    }

    /// Motor intensities 0-255, shifted out as 0-15 on every following clock
    pub fn set_rumble(&mut self, left: u8, right: u8) {
        if self.transport.rumble_mut().set(left, right) {
            let rumble = self.transport.rumble();
            debug!(
                "Rumble frame {:#06X} (left {}, right {})",
                rumble.frame(),
                rumble.left(),
                rumble.right()
            );
        }
    }

    pub fn rumble(&self) -> &RumbleFrame {
        self.transport.rumble()
    }

    pub fn pins(&self) -> BusPins {
        self.transport.pins()
    }

    pub fn settings(&self) -> &PadSettings {
        &self.settings
    }

    /// Current state as a single value per device type
    pub fn report(&self) -> PadReport {
        match self.device {
            DeviceType::None => PadReport::None,
            DeviceType::Controller => PadReport::Controller(self.controller),
            DeviceType::Nes => PadReport::Nes(self.controller),
            DeviceType::Mouse => PadReport::Mouse(self.mouse),
            DeviceType::Keyboard => PadReport::Keyboard {
                scancodes: self.keyboard.scancodes().to_vec(),
            },
        }
    }
}

impl SnesPad<Uninitialized> {
    pub fn create(
        pins: BusPins,
        io: Box<dyn PadIo + Send>,
        settings: Option<PadSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating pad on {:?} with settings {:?}", pins, settings);

        let transport = Transport::new(io, pins, settings.timing());
        Self::new(
            transport,
            settings,
            DeviceType::None,
            ControllerState::default(),
            MouseState::default(),
            KeyboardState::default(),
            false, // caps_locked
            0,     // last_read
        )
    }

    /// Configure the port pins and transition to `Ready`
    pub fn begin(mut self) -> Result<SnesPad<Ready>, PadError> {
        info!("Configuring controller port {:?}", self.transport.pins());
        self.transport.configure_pins()?;

        debug!("Pins configured, transitioning to Ready");
        Ok(self.transition())
    }
}

impl SnesPad<Ready> {
    /// Forget the current device and detect from scratch
    ///
    /// When a device answers, buttons, directions and mouse movement are
    /// cleared so the new device starts from a clean baseline.
    pub fn start(&mut self) {
        debug!("Detecting device");
        self.device = DeviceType::None;

        let packet = self.read();
        debug!("Detection packet: {:#010X}", packet);

        if self.device != DeviceType::None {
            info!("Detected device: {:?}", self.device);
            self.controller = ControllerState::default();
            self.mouse.x = 0;
            self.mouse.y = 0;
            self.mouse.primary = false;
            self.mouse.secondary = false;
        } else {
            debug!("No device detected");
        }
    }

    /// One protocol cycle, updates the public state in place
    pub fn poll(&mut self) {
        if self.device == DeviceType::None {
            self.start();
            return;
        }

        let word = self.read();
        if word == 0 {
            debug!("Empty read from {:?}, re-detecting", self.device);
            self.device = DeviceType::None;
            self.start();
            return;
        }

        match self.device {
            DeviceType::Controller => self.controller = ControllerState::from_snes(word),
            DeviceType::Nes => self.controller.apply_nes(word),
            DeviceType::Mouse => {
                self.mouse.apply_report(word, self.settings.mouse_precision);
                self.controller.a = self.mouse.primary;
                self.controller.b = self.mouse.secondary;
            }
            // scancodes were already collected during the read
            DeviceType::Keyboard | DeviceType::None => {}
        }

        if word != self.last_read {
            debug!("State changed: {:?}", self.report());
            self.last_read = word;
        }
    }

    /// Latch, shift, probe the keyboard and classify
    ///
    /// Returns the inverted (active-high) word, 0 only when the port is empty.
    fn read(&mut self) -> u32 {
        let pins = self.transport.pins();

        // An attached device holds data0 low before the latch, an empty port
        // floats high on the pull-up
        let disconnected = self.transport.sample(pins.data0);

        let request_speed = self.device == DeviceType::Mouse
            && self.mouse.speed_fails < self.settings.mouse_speed_fail_threshold
            && self.mouse.speed != MouseSpeed::Fast;
        self.transport.latch_and_prime(request_speed);

        let mut raw = 0u32;
        for i in 0..32u32 {
            let bit = self.transport.shift_bit(pins.data0);
            raw |= bit << i;

            // A low 16th bit announces the 32-bit mouse frame
            if i == 15 {
                if bit == 1 {
                    break;
                }
                self.transport.settle();
            }
        }

        let is_keyboard = keyboard::probe(
            &mut self.transport,
            &mut self.keyboard,
            self.device,
            self.caps_locked,
        );

        // Buttons are active low
        let word = !raw;

        if !is_keyboard && disconnected && word & 0xFFFF == 0 {
            if self.device != DeviceType::None {
                info!("Device {:?} disconnected", self.device);
            }
            self.device = DeviceType::None;
            self.mouse.reset_speed();
            return 0;
        }

        let previous = self.device;
        self.device = if is_keyboard {
            DeviceType::Keyboard
        } else if is_snes_pad(word) {
            DeviceType::Controller
        } else if is_nes(word) {
            DeviceType::Nes
        } else if is_mouse(word) {
            self.mouse
                .update_speed(word, self.settings.mouse_speed_fail_threshold);
            DeviceType::Mouse
        } else {
            warn!("Unknown device, packet {:#010X}", word);
            DeviceType::None
        };

        if self.device != previous && previous != DeviceType::None {
            info!("Device changed: {:?} -> {:?}", previous, self.device);
        }

        word
    }
}
