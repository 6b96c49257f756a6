//! Raspberry Pi GPIO backend

use super::{PadIo, PinMode};
use crate::error::PadError;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// [`PadIo`] on the Pi's GPIO header, pins are BCM numbers
pub struct RppalIo {
    gpio: Gpio,
    outputs: HashMap<u8, OutputPin>,
    inputs: HashMap<u8, InputPin>,
}

impl RppalIo {
    pub fn new() -> Result<Self, PadError> {
        info!("Opening Raspberry Pi GPIO");
        let gpio = Gpio::new().map_err(|e| PadError::Gpio(e.to_string()))?;

        Ok(Self {
            gpio,
            outputs: HashMap::new(),
            inputs: HashMap::new(),
        })
    }
}

impl PadIo for RppalIo {
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), PadError> {
        let gpio_pin = self
            .gpio
            .get(pin)
            .map_err(|e| PadError::PinConfiguration {
                pin,
                reason: e.to_string(),
            })?;

        match mode {
            PinMode::Output => {
                self.inputs.remove(&pin);
                self.outputs.insert(pin, gpio_pin.into_output());
            }
            PinMode::InputPullUp => {
                self.outputs.remove(&pin);
                self.inputs.insert(pin, gpio_pin.into_input_pullup());
            }
        }
        Ok(())
    }

    fn write(&mut self, pin: u8, level: bool) {
        match self.outputs.get_mut(&pin) {
            Some(output) if level => output.set_high(),
            Some(output) => output.set_low(),
            None => warn!("Write to unconfigured pin {}", pin),
        }
    }

    fn read(&mut self, pin: u8) -> bool {
        match self.inputs.get(&pin) {
            Some(input) => input.is_high(),
            None => {
                warn!("Read from unconfigured pin {}, assuming pull-up level", pin);
                true
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        // thread::sleep is far too coarse for 12µs phases
        let deadline = Instant::now() + Duration::from_micros(u64::from(us));
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}
