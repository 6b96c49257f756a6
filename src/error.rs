//! Error definitions for the bus driver
//!
//! Only hardware setup and the polling handle can fail. Protocol level problems
//! (empty port, unknown device, keyboard desync) never show up here, they are
//! reported through [`crate::pad::DeviceType::None`] instead.

use thiserror::Error;

/// Errors raised while setting up or driving a pad
#[derive(Debug, Error)]
pub enum PadError {
    /// The GPIO backend could not be opened
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// A single pin could not be claimed or configured
    #[error("Failed to configure pin {pin}: {reason}")]
    PinConfiguration { pin: u8, reason: String },

    /// Communication with the polling task broke down
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// General initialization error
    #[error("Initialization error: {0}")]
    InitializationError(String),
}
