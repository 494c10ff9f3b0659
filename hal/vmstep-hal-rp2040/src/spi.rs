//! SPI master adapter
//!
//! Any blocking `embedded-hal` SPI bus (the embassy-rp `Spi<_, Blocking>`
//! in firmware) becomes a `vmstep-hal` bus. Chip select stays with the
//! device driver.

use embassy_rp::spi::{Config, Phase, Polarity};
use embedded_hal::spi::SpiBus as EhSpiBus;
use vmstep_hal::spi;
use vmstep_hal::SpiConfig;

/// Blocking SPI master
pub struct SpiMaster<B> {
    bus: B,
}

impl<B: EhSpiBus> SpiMaster<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Release the underlying bus
    pub fn release(self) -> B {
        self.bus
    }
}

impl<B: EhSpiBus> vmstep_hal::SpiBus for SpiMaster<B> {
    type Error = B::Error;

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.transfer_in_place(data)?;
        // The frame must be fully clocked out before chip select rises
        self.bus.flush()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.bus.write(data)?;
        self.bus.flush()
    }
}

/// Convert a bus configuration into the embassy-rp form
pub fn spi_config(config: &SpiConfig) -> Config {
    let (polarity, phase): (spi::Polarity, spi::Phase) = config.mode.into();
    let mut out = Config::default();
    out.frequency = config.frequency;
    out.polarity = match polarity {
        spi::Polarity::IdleLow => Polarity::IdleLow,
        spi::Polarity::IdleHigh => Polarity::IdleHigh,
    };
    out.phase = match phase {
        spi::Phase::CaptureOnFirstTransition => Phase::CaptureOnFirstTransition,
        spi::Phase::CaptureOnSecondTransition => Phase::CaptureOnSecondTransition,
    };
    out
}
