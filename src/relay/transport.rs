//! Serial link seam between the relay engine and the downstream unit.
//!
//! The device wires in `adapters::uart::UartTransport`; tests script the
//! downstream side with their own implementation.

/// The downstream serial link as the relay engine sees it.
///
/// Reads must not block: the engine calls [`read`](Transport::read) once
/// per control pass and treats `Ok(0)` as "nothing arrived yet".  A
/// [`write`](Transport::write) may accept fewer bytes than offered; the
/// engine reports that as a short write rather than retrying.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Copy whatever has arrived into `buf`, returning the byte count.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Queue `data` for transmission, returning the bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Block until queued bytes are on the wire.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Link with nothing attached: every frame is swallowed and no reply
/// ever comes back, so each dispatch ends in a relay timeout.
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = core::convert::Infallible;

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
