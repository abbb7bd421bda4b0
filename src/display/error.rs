/*
 *  display/error.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for the MAX7219 display subsystem
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::error::Error;
use std::fmt;

use crate::display::max7219::DriverState;

/// Unified error type for all display operations
#[derive(Debug)]
pub enum DisplayError {
    /// No SPI controller / chip-select pair matching the configuration
    DeviceNotFound {
        controller: u8,
        chip_select: u8,
        detail: String,
    },

    /// The SPI device exists but could not be opened or configured
    SpiError(String),

    /// A single (address, data) write was rejected by the bus
    TransferFailed { register: u8, detail: String },

    /// Setup aborted; `source` carries the step that failed
    Initialization {
        message: String,
        source: Option<Box<DisplayError>>,
    },

    /// Write attempted before the configuration sequence finished
    NotReady(DriverState),

    /// Invalid configuration
    InvalidConfiguration(String),
}

impl DisplayError {
    pub fn initialization(message: impl Into<String>, cause: DisplayError) -> Self {
        DisplayError::Initialization {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn is_device_not_found(&self) -> bool {
        matches!(self, DisplayError::DeviceNotFound { .. })
    }

    /// Whole cause chain, one line per error, outermost first.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            out.push_str("\n  caused by: ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::DeviceNotFound { controller, chip_select, detail } =>
                write!(f, "SPI device not found (controller {}, chip select {}): {}",
                    controller, chip_select, detail),
            DisplayError::SpiError(msg) =>
                write!(f, "SPI communication error: {}", msg),
            DisplayError::TransferFailed { register, detail } =>
                write!(f, "SPI write to register 0x{:02X} failed: {}", register, detail),
            DisplayError::Initialization { message, .. } =>
                write!(f, "Display initialization failed: {}", message),
            DisplayError::NotReady(state) =>
                write!(f, "Display not ready (state {:?})", state),
            DisplayError::InvalidConfiguration(msg) =>
                write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for DisplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DisplayError::Initialization { source: Some(inner), .. } => Some(inner.as_ref()),
            _ => None,
        }
    }
}

// Conversion from Linux SPI errors
impl From<linux_embedded_hal::SPIError> for DisplayError {
    fn from(err: linux_embedded_hal::SPIError) -> Self {
        DisplayError::SpiError(format!("{:?}", err))
    }
}
