/*
 *  display/mock.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  In-memory SPI device for testing and dry runs
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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::spi::{self, ErrorKind, ErrorType, Operation, SpiDevice};
use log::trace;

use crate::config::BusConfig;
use crate::display::bus::DeviceProvider;
use crate::display::error::DisplayError;

/// Mock SPI device
///
/// Records every successful write so tests can check exactly what went over
/// the wire, and can be told to fail transfers. Clones share state, so a test
/// keeps one clone while the driver owns another.
#[derive(Debug, Clone, Default)]
pub struct MockSpi {
    state: Arc<Mutex<MockSpiState>>,
}

/// Internal state for the mock device (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockSpiState {
    /// Bytes of each successful transaction, in order
    pub transfers: Vec<Vec<u8>>,

    /// Number of transactions rejected
    pub failures: usize,

    /// Fail this many upcoming transactions
    pub fail_next: usize,

    /// Succeed this many more transactions, then fail everything
    pub fail_after: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSpiError;

impl spi::Error for MockSpiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockSpiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transfers(&self) -> Vec<Vec<u8>> {
        self.lock().transfers.clone()
    }

    pub fn failures(&self) -> usize {
        self.lock().failures
    }

    pub fn clear_transfers(&self) {
        self.lock().transfers.clear();
    }

    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    pub fn fail_after(&self, successes: usize) {
        self.lock().fail_after = Some(successes);
    }

    /// Last value written to each digit register, row 1 first.
    pub fn rows(&self) -> [u8; 8] {
        let mut rows = [0u8; 8];
        for t in self.lock().transfers.iter() {
            if let [address @ 1..=8, data] = t.as_slice() {
                rows[(*address - 1) as usize] = *data;
            }
        }
        rows
    }

    fn should_fail(state: &mut MockSpiState) -> bool {
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return true;
        }
        match state.fail_after.as_mut() {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }
}

impl ErrorType for MockSpi {
    type Error = MockSpiError;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.lock();

        if Self::should_fail(&mut state) {
            state.failures += 1;
            return Err(MockSpiError);
        }

        let mut written = Vec::new();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => written.extend_from_slice(bytes),
                Operation::Transfer(read, write) => {
                    written.extend_from_slice(write);
                    read.fill(0);
                }
                Operation::TransferInPlace(bytes) => {
                    written.extend_from_slice(bytes);
                    bytes.fill(0);
                }
                Operation::Read(bytes) => bytes.fill(0),
                Operation::DelayNs(_) => {}
            }
        }
        trace!("spi <- {:02X?}", written);
        state.transfers.push(written);
        Ok(())
    }
}

/// Provider handing out a shared [`MockSpi`], or simulating a missing device.
#[derive(Debug, Clone)]
pub struct MockProvider {
    spi: MockSpi,
    present: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self { spi: MockSpi::new(), present: true }
    }

    pub fn missing() -> Self {
        Self { spi: MockSpi::new(), present: false }
    }

    /// Handle on the device this provider gives out.
    pub fn spi(&self) -> MockSpi {
        self.spi.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProvider for MockProvider {
    type Device = MockSpi;

    fn acquire_device(&self, bus: &BusConfig) -> Result<MockSpi, DisplayError> {
        if !self.present {
            return Err(DisplayError::DeviceNotFound {
                controller: bus.controller,
                chip_select: bus.chip_select,
                detail: "no mock device attached".to_string(),
            });
        }
        Ok(self.spi.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_writes() {
        let mut spi = MockSpi::new();
        spi.write(&[0x01, 0xAA]).unwrap();
        spi.write(&[0x02, 0xBB]).unwrap();

        assert_eq!(spi.transfers(), vec![vec![0x01, 0xAA], vec![0x02, 0xBB]]);
        assert_eq!(spi.rows(), [0xAA, 0xBB, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_simulated_failures() {
        let mut spi = MockSpi::new();
        spi.fail_next(2);

        assert!(spi.write(&[0x01, 0x00]).is_err());
        assert!(spi.write(&[0x01, 0x00]).is_err());
        assert!(spi.write(&[0x01, 0x00]).is_ok());
        assert_eq!(spi.failures(), 2);
        assert_eq!(spi.transfers().len(), 1);

        spi.fail_after(1);
        assert!(spi.write(&[0x02, 0x00]).is_ok());
        assert!(spi.write(&[0x03, 0x00]).is_err());
        assert!(spi.write(&[0x04, 0x00]).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let observer = MockSpi::new();
        let mut device = observer.clone();
        device.write(&[0x0C, 0x01]).unwrap();
        assert_eq!(observer.transfers(), vec![vec![0x0C, 0x01]]);
    }

    #[test]
    fn test_missing_provider() {
        let err = MockProvider::missing().acquire_device(&BusConfig::default()).unwrap_err();
        assert!(err.is_device_not_found());
        assert!(MockProvider::new().acquire_device(&BusConfig::default()).is_ok());
    }
}
