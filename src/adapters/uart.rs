//! ESP-IDF UART byte channel.
//!
//! Wraps `esp_idf_hal::uart::UartDriver` as a non-blocking
//! [`ByteChannel`]: reads use a zero tick timeout and return 0 when the
//! RX FIFO is empty.  Only built for `target_os = "espidf"`.

use esp_idf_hal::delay::{BLOCK, NON_BLOCK};
use esp_idf_hal::uart::UartDriver;
use esp_idf_svc::sys::EspError;

use crate::link::transport::ByteChannel;

/// Modem serial line on a hardware UART.
pub struct UartChannel<'d> {
    uart: UartDriver<'d>,
}

impl<'d> UartChannel<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }
}

impl ByteChannel for UartChannel<'_> {
    type Error = EspError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EspError> {
        self.uart.read(buf, NON_BLOCK)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, EspError> {
        self.uart.write(data)
    }

    fn flush(&mut self) -> Result<(), EspError> {
        self.uart.wait_tx_done(BLOCK)
    }

    fn available(&self) -> bool {
        self.uart.remaining_read().is_ok_and(|n| n > 0)
    }
}
