//! Host-side driver for SNES controllers, NES pads, SNES mice and the XBAND
//! keyboard on a bit-banged five wire controller port.
//!
//! - [`bus`] drives latch, clock and the I/O bit and samples the data lines
//! - [`pad`] classifies the attached device and decodes its reports
//! - [`config`] loads the port wiring and tunables from TOML

pub mod bus;
pub mod config;
pub mod error;
pub mod pad;

pub use bus::{BusPins, PadIo, PinMode};
pub use config::{Backend, PadConfig};
pub use error::PadError;
pub use pad::{DeviceType, PadHandle, PadReport, PadSettings, SnesPad};
