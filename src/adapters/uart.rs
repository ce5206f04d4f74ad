//! Serial link to the downstream unit.
//!
//! Implements [`Transport`] for the relay engine.
//!
//! - **`target_os = "espidf"`**: `esp_idf_hal::uart::UartDriver` at
//!   115 200 baud, 8N1.  Reads never block; writes block until queued.
//! - **all other targets**: an in-memory pipe.  Tests and the host
//!   simulation play the downstream side with [`UartTransport::feed_rx`]
//!   and [`UartTransport::take_tx`].

use crate::relay::transport::Transport;

#[cfg(target_os = "espidf")]
use esp_idf_hal::delay::{BLOCK, NON_BLOCK};
#[cfg(target_os = "espidf")]
use esp_idf_hal::sys::EspError;
#[cfg(target_os = "espidf")]
use esp_idf_hal::uart::UartDriver;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

/// Line rate shared with the downstream unit.
pub const BAUD_RATE: u32 = 115_200;

// ───────────────────────────────────────────────────────────────
// Device backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct UartTransport {
    driver: UartDriver<'static>,
}

#[cfg(target_os = "espidf")]
impl UartTransport {
    pub fn new(driver: UartDriver<'static>) -> Self {
        Self { driver }
    }
}

#[cfg(target_os = "espidf")]
impl Transport for UartTransport {
    type Error = EspError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EspError> {
        self.driver.read(buf, NON_BLOCK)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, EspError> {
        self.driver.write(data)
    }

    fn flush(&mut self) -> Result<(), EspError> {
        self.driver.wait_tx_done(BLOCK)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct UartTransport {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Bytes accepted per write; `None` accepts everything.
    write_limit: Option<usize>,
}

#[cfg(not(target_os = "espidf"))]
impl UartTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the downstream unit had sent them.
    pub fn feed_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Drain everything written towards the downstream unit.
    pub fn take_tx(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }

    /// Simulate a congested link that accepts at most `limit` bytes per write.
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }
}

#[cfg(not(target_os = "espidf"))]
impl Transport for UartTransport {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let n = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.tx.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
