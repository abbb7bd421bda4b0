/*
 *  display/bus.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  SPI device selection for the display
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

use std::path::Path;

use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::SpidevDevice;
use log::{debug, info};

use crate::config::BusConfig;
use crate::display::error::DisplayError;

/// Hands out the SPI device the display driver will own.
///
/// Called once at startup; the returned handle is never shared.
pub trait DeviceProvider {
    type Device: SpiDevice + Send;

    fn acquire_device(&self, bus: &BusConfig) -> Result<Self::Device, DisplayError>;
}

/// Linux spidev: `/dev/spidev{controller}.{chip_select}`, mode 0, 8-bit words.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpidevProvider;

impl DeviceProvider for SpidevProvider {
    type Device = SpidevDevice;

    fn acquire_device(&self, bus: &BusConfig) -> Result<SpidevDevice, DisplayError> {
        let path = bus.device_path();
        if !Path::new(&path).exists() {
            return Err(DisplayError::DeviceNotFound {
                controller: bus.controller,
                chip_select: bus.chip_select,
                detail: format!("{} does not exist (is SPI enabled?)", path.display()),
            });
        }

        debug!("Opening {} at {} Hz", path.display(), bus.speed_hz);
        let mut spi = SpidevDevice::open(&path).map_err(|e| {
            DisplayError::initialization(
                format!("SPI initialization failed on {}", path.display()),
                e.into(),
            )
        })?;

        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(bus.speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options).map_err(|e| {
            DisplayError::initialization(
                format!("SPI initialization failed on {}", path.display()),
                DisplayError::SpiError(format!("configure: {}", e)),
            )
        })?;

        info!("SPI {} ready ({} Hz, mode 0)", path.display(), bus.speed_hz);
        Ok(spi)
    }
}
