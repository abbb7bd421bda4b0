/*
 *  scroll/scroller.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  Periodic scroll task driving the MAX7219
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

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::spi::SpiDevice;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::config::ScrollConfig;
use crate::display::bus::DeviceProvider;
use crate::display::error::DisplayError;
use crate::display::max7219::{DriverState, Max7219};
use crate::scroll::buffer::ScrollBuffer;
use crate::scroll::encoder::encode;

/// Shortest accepted tick; zero would spin the runtime.
pub const MIN_SCROLL_DELAY: Duration = Duration::from_millis(1);

/// Stop signal shared between the host and the scroll loop.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as self, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for changing what the loop shows while it runs.
/// Changes are picked up at the start of the next tick.
#[derive(Debug, Clone)]
pub struct ScrollControl {
    message: Arc<watch::Sender<String>>,
    delay: Arc<watch::Sender<Duration>>,
}

impl ScrollControl {
    pub fn set_message(&self, message: &str) {
        self.message.send_replace(message.to_string());
    }

    pub fn set_scroll_delay(&self, millis: u64) {
        let delay = Duration::from_millis(millis).max(MIN_SCROLL_DELAY);
        self.delay.send_replace(delay);
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    Rendered,
    /// Frame dropped; the loop carries on with the next tick
    Skipped(DisplayError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    pub frames_rendered: u64,
    pub frames_skipped: u64,
}

/// The scroll loop: render the window, wait, rotate one column.
///
/// Sole owner of the scroll buffer and of the driver's write path.
pub struct Scroller<D> {
    driver: Max7219<D>,
    buffer: ScrollBuffer,
    delay: Duration,
    control: ScrollControl,
    message_rx: watch::Receiver<String>,
    delay_rx: watch::Receiver<Duration>,
}

impl<D: SpiDevice> Scroller<D> {
    /// Encode the message, acquire the device and configure the chip.
    ///
    /// Nothing is returned until the display is Ready; any failure here means
    /// the loop must not start.
    pub async fn initialize<P>(provider: &P, config: &ScrollConfig) -> Result<Self, DisplayError>
    where
        P: DeviceProvider<Device = D>,
    {
        let buffer = encode(&config.message);
        let mut driver = Max7219::initialize(provider, &config.bus, config.driver.clone()).await?;
        driver.clear()
            .await
            .map_err(|e| DisplayError::initialization("clearing display failed", e))?;

        info!("Display ready, message {:?} ({} columns)", config.message, buffer.len());
        Ok(Self::with_driver(driver, buffer, config.message.clone(), config.scroll_delay))
    }

    fn with_driver(driver: Max7219<D>, buffer: ScrollBuffer, message: String, delay: Duration) -> Self {
        let delay = delay.max(MIN_SCROLL_DELAY);
        let (message_tx, message_rx) = watch::channel(message);
        let (delay_tx, delay_rx) = watch::channel(delay);
        Self {
            driver,
            buffer,
            delay,
            control: ScrollControl {
                message: Arc::new(message_tx),
                delay: Arc::new(delay_tx),
            },
            message_rx,
            delay_rx,
        }
    }

    pub fn control(&self) -> ScrollControl {
        self.control.clone()
    }

    pub fn set_message(&self, message: &str) {
        self.control.set_message(message);
    }

    pub fn set_scroll_delay(&self, millis: u64) {
        self.control.set_scroll_delay(millis);
    }

    pub fn scroll_delay(&self) -> Duration {
        self.delay
    }

    pub fn buffer(&self) -> &ScrollBuffer {
        &self.buffer
    }

    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    /// Swap in a pending message or delay, if the host sent one.
    fn apply_updates(&mut self) {
        if self.message_rx.has_changed().unwrap_or(false) {
            let message = self.message_rx.borrow_and_update().clone();
            self.buffer = encode(&message);
            info!("Message changed to {:?} ({} columns)", message, self.buffer.len());
        }
        if self.delay_rx.has_changed().unwrap_or(false) {
            self.delay = *self.delay_rx.borrow_and_update();
            info!("Scroll delay now {} ms", self.delay.as_millis());
        }
    }

    /// Push the current window to the display. Write errors are logged and
    /// reported, never propagated.
    pub async fn tick(&mut self) -> TickOutcome {
        self.apply_updates();
        let window = self.buffer.render_window();
        match self.driver.write_window(&window).await {
            Ok(()) => TickOutcome::Rendered,
            Err(e) => {
                warn!("Display update skipped: {}", e);
                TickOutcome::Skipped(e)
            }
        }
    }

    /// Advance the animation by one column.
    pub fn advance(&mut self) {
        self.buffer.rotate_left_by_one();
    }

    /// Run until `cancel` fires. Cancellation is checked before every frame
    /// and also ends the inter-frame wait early.
    pub async fn start_scrolling(&mut self, cancel: &CancelToken) -> ScrollReport {
        let mut report = ScrollReport::default();
        info!("Scrolling started ({} ms per column)", self.delay.as_millis());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.tick().await {
                TickOutcome::Rendered => report.frames_rendered += 1,
                TickOutcome::Skipped(_) => report.frames_skipped += 1,
            }

            tokio::select! {
                _ = sleep(self.delay) => {}
                _ = cancel.cancelled() => break,
            }

            self.advance();
            if self.buffer.offset() == 0 && !self.buffer.is_empty() {
                debug!("Message wrapped after {} frames", report.frames_rendered);
            }
        }

        info!(
            "Scrolling stopped: {} frames rendered, {} skipped",
            report.frames_rendered, report.frames_skipped
        );
        report
    }

    /// Show one character statically (font check).
    pub async fn show_char(&mut self, ch: char) -> Result<(), DisplayError> {
        self.driver.show_glyph(ch).await
    }

    /// Blank (optionally) and power the chip down.
    pub async fn shutdown(mut self, clear: bool) {
        self.driver.shutdown(clear).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::max7219::DriverOptions;
    use crate::display::mock::{MockProvider, MockSpi};
    use crate::glyphs::lookup;

    fn test_config(message: &str) -> ScrollConfig {
        ScrollConfig {
            message: message.to_string(),
            scroll_delay: Duration::from_millis(1),
            driver: DriverOptions {
                settle_delay: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn scroller(message: &str) -> (Scroller<MockSpi>, MockSpi) {
        let provider = MockProvider::new();
        let spi = provider.spi();
        let scroller = Scroller::initialize(&provider, &test_config(message)).await.unwrap();
        spi.clear_transfers();
        (scroller, spi)
    }

    #[tokio::test]
    async fn test_initialize_clears_display() {
        let provider = MockProvider::new();
        let spi = provider.spi();

        let scroller = Scroller::initialize(&provider, &test_config("A")).await.unwrap();

        assert_eq!(scroller.state(), DriverState::Ready);
        // 5 setup writes then 8 blank rows
        let transfers = spi.transfers();
        assert_eq!(transfers.len(), 13);
        assert!(transfers[5..].iter().all(|t| t[1] == 0));
    }

    #[tokio::test]
    async fn test_missing_device_never_transfers() {
        let provider = MockProvider::missing();
        let spi = provider.spi();

        let result = Scroller::initialize(&provider, &test_config("HI")).await;

        assert!(matches!(result, Err(ref e) if e.is_device_not_found()));
        assert!(spi.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_tick_writes_window_then_advance_shifts() {
        let (mut scroller, spi) = scroller("HI * ").await;

        assert!(matches!(scroller.tick().await, TickOutcome::Rendered));
        assert_eq!(spi.rows(), lookup('H'));

        for _ in 0..8 {
            scroller.advance();
        }
        scroller.tick().await;
        assert_eq!(spi.rows(), lookup('I'));
    }

    #[tokio::test]
    async fn test_failed_tick_is_skipped_not_fatal() {
        let (mut scroller, spi) = scroller("HI").await;
        spi.fail_next(1);

        assert!(matches!(scroller.tick().await, TickOutcome::Skipped(DisplayError::TransferFailed { .. })));
        assert_eq!(scroller.state(), DriverState::Ready);

        assert!(matches!(scroller.tick().await, TickOutcome::Rendered));
        assert_eq!(spi.rows(), lookup('H'));
    }

    #[tokio::test]
    async fn test_set_message_applies_next_tick() {
        let (mut scroller, spi) = scroller("HI").await;
        scroller.advance();

        scroller.control().set_message("A");
        assert_eq!(scroller.buffer().len(), 16);

        scroller.tick().await;
        assert_eq!(scroller.buffer().len(), 8);
        assert_eq!(scroller.buffer().offset(), 0);
        assert_eq!(spi.rows(), lookup('A'));
    }

    #[tokio::test]
    async fn test_set_scroll_delay_is_clamped() {
        let (mut scroller, _spi) = scroller("HI").await;

        scroller.set_scroll_delay(0);
        scroller.tick().await;
        assert_eq!(scroller.scroll_delay(), MIN_SCROLL_DELAY);

        scroller.set_scroll_delay(75);
        scroller.tick().await;
        assert_eq!(scroller.scroll_delay(), Duration::from_millis(75));
    }

    #[tokio::test]
    async fn test_empty_message_renders_blank() {
        let (mut scroller, spi) = scroller("").await;

        assert!(matches!(scroller.tick().await, TickOutcome::Rendered));
        scroller.advance();
        assert!(scroller.buffer().is_empty());
        assert_eq!(spi.rows(), [0u8; 8]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_does_nothing() {
        let (mut scroller, spi) = scroller("HI").await;
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = scroller.start_scrolling(&cancel).await;

        assert_eq!(report, ScrollReport::default());
        assert!(spi.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_loop_survives_transfer_failure() {
        let (mut scroller, spi) = scroller("HI * ").await;
        spi.fail_next(1);
        let cancel = CancelToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        let report = scroller.start_scrolling(&cancel).await;

        assert_eq!(report.frames_skipped, 1);
        assert!(report.frames_rendered >= 1);
        assert_eq!(spi.transfers().len() as u64, report.frames_rendered * 8);
    }

    #[tokio::test]
    async fn test_cancel_token() {
        let cancel = CancelToken::new();
        assert!(!cancel.is_cancelled());

        let waiter = cancel.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        cancel.cancel();
        handle.await.unwrap();

        assert!(cancel.is_cancelled());
        // already cancelled resolves immediately
        cancel.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancel_interrupts_long_wait() {
        let (mut scroller, spi) = scroller("HI").await;
        scroller.set_scroll_delay(30_000);
        let cancel = CancelToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });

        let started = std::time::Instant::now();
        let report = scroller.start_scrolling(&cancel).await;

        assert!(started.elapsed() < Duration::from_secs(2), "loop took {:?}", started.elapsed());
        assert_eq!(report.frames_rendered, 1);
        // cancelled mid-wait, so the pending rotation never happened
        assert_eq!(scroller.buffer().offset(), 0);
        assert_eq!(spi.transfers().len(), 8);
    }

    #[tokio::test]
    async fn test_row_delay_does_not_starve_cancel() {
        let provider = MockProvider::new();
        let mut config = test_config("HI");
        config.driver.row_delay = Duration::from_millis(10);
        let mut scroller = Scroller::initialize(&provider, &config).await.unwrap();
        let cancel = CancelToken::new();

        let started = std::time::Instant::now();
        let stopper = cancel.clone();
        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(5)).await;
            stopper.cancel();
            started.elapsed()
        });

        let report = scroller.start_scrolling(&cancel).await;
        let cancelled_at = canceller.await.unwrap();

        // the canceller runs during the first frame's row pauses
        assert!(cancelled_at < Duration::from_millis(60), "cancel ran at {:?}", cancelled_at);
        // that frame completes, then the loop stops without starting another
        assert_eq!(report.frames_rendered, 1);
        assert!(started.elapsed() < Duration::from_millis(500), "loop took {:?}", started.elapsed());
    }
}
