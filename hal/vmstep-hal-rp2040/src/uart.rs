//! Host link over a buffered UART
//!
//! The receive side is interrupt-driven into a ring buffer; reads here
//! only drain what has already arrived. Writes block until the reply fits
//! in the transmit ring.

use embassy_rp::uart::{self, BufferedUart};
use embedded_io::{Read, ReadReady, Write};
use vmstep_hal::uart::{DataBits, Parity, StopBits};
use vmstep_hal::{ByteTransport, UartConfig};

/// Buffered UART carrying the host protocol
pub struct LinkUart {
    uart: BufferedUart,
    rx_errors: u32,
    tx_errors: u32,
}

impl LinkUart {
    pub fn new(uart: BufferedUart) -> Self {
        Self {
            uart,
            rx_errors: 0,
            tx_errors: 0,
        }
    }

    /// Receive errors (overrun, break, parity, framing) seen so far
    pub fn rx_errors(&self) -> u32 {
        self.rx_errors
    }

    /// Replies that could not be queued
    pub fn tx_errors(&self) -> u32 {
        self.tx_errors
    }
}

impl ByteTransport for LinkUart {
    fn bytes_available(&mut self) -> usize {
        // The ring buffer does not expose its fill level
        match self.uart.read_ready() {
            Ok(true) => 1,
            Ok(false) => 0,
            Err(_) => {
                self.rx_errors = self.rx_errors.wrapping_add(1);
                0
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !matches!(self.uart.read_ready(), Ok(true)) {
            return None;
        }
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(_) => {
                self.rx_errors = self.rx_errors.wrapping_add(1);
                None
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) {
        if self.uart.write_all(data).is_err() {
            self.tx_errors = self.tx_errors.wrapping_add(1);
        }
    }
}

/// Convert line settings into the embassy-rp form
pub fn uart_config(config: &UartConfig) -> uart::Config {
    let mut out = uart::Config::default();
    out.baudrate = config.baudrate;
    out.data_bits = match config.data_bits {
        DataBits::Seven => uart::DataBits::DataBits7,
        DataBits::Eight => uart::DataBits::DataBits8,
    };
    out.parity = match config.parity {
        Parity::None => uart::Parity::ParityNone,
        Parity::Even => uart::Parity::ParityEven,
        Parity::Odd => uart::Parity::ParityOdd,
    };
    out.stop_bits = match config.stop_bits {
        StopBits::One => uart::StopBits::STOP1,
        StopBits::Two => uart::StopBits::STOP2,
    };
    out
}
