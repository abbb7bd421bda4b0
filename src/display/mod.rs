/*
 *  display/mod.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - MAX7219 driver, bus selection and test doubles
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

pub mod bus;
pub mod error;
pub mod max7219;

// In-memory bus for tests and --dry-run
pub mod mock;

// Re-exports for convenience
pub use bus::{DeviceProvider, SpidevProvider};
pub use error::DisplayError;
pub use max7219::{DriverOptions, DriverState, Max7219};
pub use mock::{MockProvider, MockSpi};
