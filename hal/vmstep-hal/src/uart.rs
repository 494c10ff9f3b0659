//! Serial host link abstractions
//!
//! The protocol engine consumes the host link one byte at a time and writes
//! whole reply frames back. The line parameters are fixed; nothing is
//! negotiated with the host.

/// Byte-oriented serial transport
///
/// Implementations wrap a buffered UART (or USB CDC) receive FIFO. Reads never
/// block: callers check [`ByteTransport::bytes_available`] first.
pub trait ByteTransport {
    /// Number of received bytes that can be read without blocking
    fn bytes_available(&mut self) -> usize;

    /// Pop one received byte
    ///
    /// Returns `None` if the receive buffer is empty.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for transmission
    fn write_bytes(&mut self, data: &[u8]);
}

impl<T: ByteTransport + ?Sized> ByteTransport for &mut T {
    fn bytes_available(&mut self) -> usize {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, data: &[u8]) {
        (**self).write_bytes(data)
    }
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl UartConfig {
    /// Host link line settings (19200 8N1)
    pub const LINK: UartConfig = UartConfig {
        baudrate: 19_200,
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
    };
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::LINK
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
