/*
 *  display/max7219.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  MAX7219 8x8 LED matrix driver over SPI
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

use std::time::Duration;

use embedded_hal::spi::SpiDevice;
use log::{debug, info, warn};
use tokio::time::sleep;

use crate::config::BusConfig;
use crate::display::bus::DeviceProvider;
use crate::display::error::DisplayError;
use crate::glyphs::{self, Glyph};
use crate::scroll::buffer::Window;

/// MAX7219 register addresses (datasheet table 2).
pub mod register {
    pub const NO_OP: u8 = 0x00;
    pub const DIGIT_0: u8 = 0x01;
    pub const DECODE_MODE: u8 = 0x09;
    pub const INTENSITY: u8 = 0x0A;
    pub const SCAN_LIMIT: u8 = 0x0B;
    pub const SHUTDOWN: u8 = 0x0C;
    pub const DISPLAY_TEST: u8 = 0x0F;
}

pub const ROWS: u8 = 8;
pub const MAX_INTENSITY: u8 = 0x0F;

/// Scan all 8 digit registers.
const SCAN_ALL_ROWS: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Configuring,
    Ready,
}

/// Tunables for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOptions {
    /// Intensity register value, 0-15
    pub intensity: u8,

    /// Pause after each setup write; the chip latches asynchronously
    pub settle_delay: Duration,

    /// Pause between row writes during normal updates, normally zero.
    /// Awaited, so other tasks keep running while a window is paced out.
    pub row_delay: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            intensity: 0,
            settle_delay: Duration::from_millis(10),
            row_delay: Duration::ZERO,
        }
    }
}

/// Single MAX7219 on a write-only SPI link.
///
/// Every register update is one 2-byte transaction, address first. The driver
/// walks Uninitialized -> Configuring -> Ready; once Ready a failed row write
/// is returned to the caller but never drops the driver out of Ready.
pub struct Max7219<D> {
    spi: Option<D>,
    state: DriverState,
    options: DriverOptions,
}

impl<D: SpiDevice> Max7219<D> {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            spi: None,
            state: DriverState::Uninitialized,
            options,
        }
    }

    /// Acquire the bus and run the setup sequence.
    pub async fn initialize<P>(provider: &P, bus: &BusConfig, options: DriverOptions) -> Result<Self, DisplayError>
    where
        P: DeviceProvider<Device = D>,
    {
        let mut driver = Self::new(options);
        driver.acquire(provider, bus)?;
        driver.configure().await?;
        Ok(driver)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Uninitialized -> Configuring.
    pub fn acquire<P>(&mut self, provider: &P, bus: &BusConfig) -> Result<(), DisplayError>
    where
        P: DeviceProvider<Device = D>,
    {
        if self.state != DriverState::Uninitialized {
            return Err(DisplayError::InvalidConfiguration(
                "SPI device already acquired".to_string(),
            ));
        }
        let spi = provider.acquire_device(bus)?;
        info!("Acquired SPI device {}", bus.device_path().display());
        self.spi = Some(spi);
        self.state = DriverState::Configuring;
        Ok(())
    }

    /// Configuring -> Ready. Any failed write aborts setup.
    pub async fn configure(&mut self) -> Result<(), DisplayError> {
        if self.state != DriverState::Configuring {
            return Err(DisplayError::NotReady(self.state));
        }
        if self.options.intensity > MAX_INTENSITY {
            return Err(DisplayError::InvalidConfiguration(format!(
                "intensity {} out of range 0..={}",
                self.options.intensity, MAX_INTENSITY
            )));
        }

        for (step, address, value) in self.setup_sequence() {
            debug!("MAX7219 setup: {} (0x{:02X} <- 0x{:02X})", step, address, value);
            self.transfer(address, value)
                .map_err(|e| DisplayError::initialization(format!("{} failed", step), e))?;
            sleep(self.options.settle_delay).await;
        }

        self.state = DriverState::Ready;
        info!("MAX7219 configured (intensity {})", self.options.intensity);
        Ok(())
    }

    fn setup_sequence(&self) -> [(&'static str, u8, u8); 5] {
        [
            ("decode mode off", register::DECODE_MODE, 0x00),
            ("scan limit", register::SCAN_LIMIT, SCAN_ALL_ROWS),
            ("intensity", register::INTENSITY, self.options.intensity),
            ("power on", register::SHUTDOWN, 0x01),
            ("display test off", register::DISPLAY_TEST, 0x00),
        ]
    }

    /// Write one window, row 0 of the window going to digit register 1.
    pub async fn write_window(&mut self, window: &Window) -> Result<(), DisplayError> {
        self.ensure_ready()?;
        for (row, &data) in window.iter().enumerate() {
            self.transfer(register::DIGIT_0 + row as u8, data)?;
            if !self.options.row_delay.is_zero() {
                sleep(self.options.row_delay).await;
            }
        }
        Ok(())
    }

    pub async fn show_glyph(&mut self, ch: char) -> Result<(), DisplayError> {
        let glyph: Glyph = glyphs::lookup(ch);
        self.write_window(&glyph).await
    }

    pub async fn clear(&mut self) -> Result<(), DisplayError> {
        self.write_window(&[0u8; ROWS as usize]).await
    }

    /// Clamped to 0-15.
    pub fn set_intensity(&mut self, level: u8) -> Result<(), DisplayError> {
        self.ensure_ready()?;
        let level = level.min(MAX_INTENSITY);
        self.transfer(register::INTENSITY, level)?;
        self.options.intensity = level;
        Ok(())
    }

    pub fn set_power(&mut self, on: bool) -> Result<(), DisplayError> {
        self.ensure_ready()?;
        self.transfer(register::SHUTDOWN, on as u8)
    }

    pub fn set_test_mode(&mut self, on: bool) -> Result<(), DisplayError> {
        self.ensure_ready()?;
        self.transfer(register::DISPLAY_TEST, on as u8)
    }

    pub fn no_op(&mut self) -> Result<(), DisplayError> {
        self.ensure_ready()?;
        self.transfer(register::NO_OP, 0x00)
    }

    /// Blank and power down. Best effort, failures are only logged.
    pub async fn shutdown(&mut self, clear: bool) {
        if self.state != DriverState::Ready {
            return;
        }
        if clear {
            if let Err(e) = self.clear().await {
                warn!("Failed to clear display on shutdown: {}", e);
            }
        }
        if let Err(e) = self.set_power(false) {
            warn!("Failed to power down display: {}", e);
        }
        info!("MAX7219 shut down");
    }

    fn ensure_ready(&self) -> Result<(), DisplayError> {
        match self.state {
            DriverState::Ready => Ok(()),
            other => Err(DisplayError::NotReady(other)),
        }
    }

    fn transfer(&mut self, address: u8, data: u8) -> Result<(), DisplayError> {
        let spi = self.spi.as_mut().ok_or(DisplayError::NotReady(self.state))?;
        spi.write(&[address, data]).map_err(|e| DisplayError::TransferFailed {
            register: address,
            detail: format!("{:?}", e),
        })
    }
}
