//! Protocol decoder for SNES-family devices
//!
//! Turns the raw bus traffic into device state:
//!
//! 1. [`snespad`] - read cycle, device classification and the `SnesPad` state machine
//! 2. [`device`] - report layouts for pads, NES pads and mice
//! 3. [`keyboard`] - the XBAND keyboard dibit sub-protocol
//! 4. [`keymap`] - scancode table and press/release decoding
//! 5. [`pad_handle`] - background polling with a watch channel for consumers
//!
//! # Architecture
//!
//! ```text
//! PadIo ──► Transport ──► SnesPad ──► PadReport
//!  (pins)   (latch/clock)  (classify)    │
//!                                        ▼
//!                                    PadHandle ──► watch::Receiver<PadSnapshot>
//! ```

pub mod device;
pub mod keyboard;
pub mod keymap;
pub mod pad_handle;
pub mod snespad;

pub use device::{ControllerState, DeviceType, MouseSpeed, MouseState, PadReport};
pub use keyboard::KeyboardState;
pub use keymap::{get_key_from_scancode, KeyEvent, KeyMapping, ScancodeDecoder};
pub use pad_handle::{PadCommand, PadHandle, PadSnapshot};
pub use snespad::{PadSettings, PadState, Phase, Ready, SnesPad, Uninitialized};
