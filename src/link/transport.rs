//! Byte channel port: the serial line to the modem.
//!
//! Implemented by the ESP-IDF UART ([`UartChannel`](crate::adapters::uart))
//! and by the scripted modems in the tests.
//!
//! The line is lossy: writes are best-effort and a busy modem may drop or
//! truncate bytes.  Nothing above this trait assumes otherwise.

/// Non-blocking, byte-oriented serial line.
pub trait ByteChannel {
    type Error: core::fmt::Debug;

    /// Copy whatever has arrived into `buf`, up to its length.  Returns 0
    /// straight away when nothing is waiting.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Queue `data` for transmission.  May accept fewer bytes than given.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Block until queued output has left the device.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// `true` when `read` would return at least one byte.
    fn available(&self) -> bool;
}

/// A modem that is never there: swallows writes, never answers.
pub struct NullChannel;

impl ByteChannel for NullChannel {
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

    fn available(&self) -> bool {
        false
    }
}

impl<T: ByteChannel + ?Sized> ByteChannel for &mut T {
    type Error = T::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }

    fn available(&self) -> bool {
        (**self).available()
    }
}
