//! DRV8434S stepper driver (SPI mode)
//!
//! The DRV8434S is a dual H-bridge stepper driver with integrated current
//! sensing, microstep indexer and stall detection, configured over SPI.
//!
//! # SPI Protocol
//!
//! Every transaction is one 16-bit frame, MSB first, SPI mode 1, with nSCS
//! held low for the whole frame:
//! - Bit 14: read (1) / write (0)
//! - Bits 13..9: register address
//! - Bits 7..0: data (ignored on reads)
//!
//! The chip answers in the same frame: the first byte is the status
//! byte, the second the current content of the addressed register.
//!
//! Control registers are write-through cached so single fields can be
//! updated without a read-modify-write on the bus, and so the cache can be
//! compared against the chip to verify a configuration took.

use vmstep_core::traits::DriverChip;
use vmstep_hal::{OutputPin, SpiBus};

/// DRV8434S register addresses
pub mod reg {
    /// Fault status
    pub const FAULT: u8 = 0x00;
    /// Per-FET overcurrent diagnostics
    pub const DIAG1: u8 = 0x01;
    /// Thermal, stall and open-load diagnostics
    pub const DIAG2: u8 = 0x02;
    /// Torque DAC, slew rate
    pub const CTRL1: u8 = 0x03;
    /// Output enable, off time, decay mode
    pub const CTRL2: u8 = 0x04;
    /// Direction/step control, microstep mode
    pub const CTRL3: u8 = 0x05;
    /// Fault clear, lock, open-load and overcurrent config
    pub const CTRL4: u8 = 0x06;
    /// Stall learn and reporting
    pub const CTRL5: u8 = 0x07;
    /// Stall threshold
    pub const CTRL6: u8 = 0x08;
    /// Ripple control, torque count scaling
    pub const CTRL7: u8 = 0x09;
}

/// CTRL1 torque DAC field (bits 7..4, 0 = 100 %)
const TRQ_DAC_SHIFT: u8 = 4;
const TRQ_DAC_MASK: u8 = 0xF0;
/// CTRL2 output enable
const EN_OUT: u8 = 1 << 7;
/// CTRL3 microstep field
const MICROSTEP_MASK: u8 = 0x0F;
/// Highest defined microstep mode (1/256)
pub const MICROSTEP_MAX: u8 = 0b1010;
/// CTRL4 fault clear (self-clearing)
const CLR_FLT: u8 = 1 << 7;
/// Highest current level
pub const CURRENT_MAX: u8 = 15;

const READ_BIT: u16 = 1 << 14;
const ADDR_SHIFT: u16 = 9;

/// Number of cached control registers (CTRL1..=CTRL7)
const CTRL_COUNT: usize = 7;

/// Power-on values of CTRL1..=CTRL7
const CTRL_DEFAULTS: [u8; CTRL_COUNT] = [0x00, 0x0F, 0x06, 0x30, 0x08, 0x03, 0x20];

/// Build a read frame
pub fn read_frame(addr: u8) -> u16 {
    READ_BIT | ((addr as u16 & 0x1F) << ADDR_SHIFT)
}

/// Build a write frame
pub fn write_frame(addr: u8, data: u8) -> u16 {
    ((addr as u16 & 0x1F) << ADDR_SHIFT) | data as u16
}

/// DRV8434S driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drv8434sError<E> {
    /// SPI bus error
    Spi(E),
    /// Current level above 15
    InvalidCurrent,
    /// Microstep mode above 1/256
    InvalidMode,
}

/// DRV8434S driver
///
/// Owns the SPI bus and the active-low chip select.
pub struct Drv8434s<SPI, CS> {
    spi: SPI,
    cs: CS,
    ctrl: [u8; CTRL_COUNT],
    status: u8,
}

impl<SPI, CS> Drv8434s<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    /// Create a driver with the cache at power-on defaults
    ///
    /// Nothing is written until [`Drv8434s::init`].
    pub fn new(spi: SPI, mut cs: CS) -> Self {
        cs.set_high();
        Self {
            spi,
            cs,
            ctrl: CTRL_DEFAULTS,
            status: 0,
        }
    }

    /// Write the whole control cache to the chip
    pub fn init(&mut self) -> Result<(), Drv8434sError<SPI::Error>> {
        self.write_cached_registers()
    }

    /// Release the bus and chip select
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    /// Status byte returned by the last transaction
    pub fn last_status(&self) -> u8 {
        self.status
    }

    /// Cached value of a control register
    ///
    /// Returns `None` for non-control addresses.
    pub fn cached(&self, addr: u8) -> Option<u8> {
        Self::ctrl_index(addr).map(|i| self.ctrl[i])
    }

    /// Current level as set in the torque DAC
    pub fn current_level(&self) -> u8 {
        CURRENT_MAX - (self.ctrl[0] >> TRQ_DAC_SHIFT)
    }

    /// Microstep mode as set in CTRL3
    pub fn microstep_mode(&self) -> u8 {
        self.ctrl[2] & MICROSTEP_MASK
    }

    /// Check if the output stage is enabled
    pub fn outputs_enabled(&self) -> bool {
        self.ctrl[1] & EN_OUT != 0
    }

    /// Read a register
    pub fn read_register(&mut self, addr: u8) -> Result<u8, Drv8434sError<SPI::Error>> {
        let response = self.transfer(read_frame(addr))?;
        Ok(response as u8)
    }

    /// Write a register, bypassing the cache
    pub fn write_register(&mut self, addr: u8, data: u8) -> Result<(), Drv8434sError<SPI::Error>> {
        self.transfer(write_frame(addr, data))?;
        Ok(())
    }

    /// Write all cached control registers
    pub fn write_cached_registers(&mut self) -> Result<(), Drv8434sError<SPI::Error>> {
        for (i, value) in self.ctrl.into_iter().enumerate() {
            self.write_register(reg::CTRL1 + i as u8, value)?;
        }
        Ok(())
    }

    /// Read back every control register and compare with the cache
    pub fn verify_cached_registers(&mut self) -> Result<bool, Drv8434sError<SPI::Error>> {
        for i in 0..CTRL_COUNT {
            let addr = reg::CTRL1 + i as u8;
            if self.read_register(addr)? != self.ctrl[i] {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn write_cached(&mut self, addr: u8, value: u8) -> Result<(), Drv8434sError<SPI::Error>> {
        if let Some(i) = Self::ctrl_index(addr) {
            self.ctrl[i] = value;
        }
        self.write_register(addr, value)
    }

    fn ctrl_index(addr: u8) -> Option<usize> {
        (reg::CTRL1..=reg::CTRL7)
            .contains(&addr)
            .then(|| (addr - reg::CTRL1) as usize)
    }

    /// One 16-bit frame with chip select asserted
    fn transfer(&mut self, frame: u16) -> Result<u16, Drv8434sError<SPI::Error>> {
        let mut buf = frame.to_be_bytes();
        self.cs.set_low();
        let result = self.spi.transfer_in_place(&mut buf);
        self.cs.set_high();
        result.map_err(Drv8434sError::Spi)?;
        self.status = buf[0];
        Ok(u16::from_be_bytes(buf))
    }
}

impl<SPI, CS> DriverChip for Drv8434s<SPI, CS>
where
    SPI: SpiBus,
    SPI::Error: core::fmt::Debug,
    CS: OutputPin,
{
    type Error = Drv8434sError<SPI::Error>;

    fn enable(&mut self) -> Result<(), Self::Error> {
        self.write_cached(reg::CTRL2, self.ctrl[1] | EN_OUT)
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        self.write_cached(reg::CTRL2, self.ctrl[1] & !EN_OUT)
    }

    fn set_current(&mut self, level: u8) -> Result<(), Self::Error> {
        if level > CURRENT_MAX {
            return Err(Drv8434sError::InvalidCurrent);
        }
        let trq = (CURRENT_MAX - level) << TRQ_DAC_SHIFT;
        self.write_cached(reg::CTRL1, (self.ctrl[0] & !TRQ_DAC_MASK) | trq)
    }

    fn set_microstep(&mut self, mode: u8) -> Result<(), Self::Error> {
        if mode > MICROSTEP_MAX {
            return Err(Drv8434sError::InvalidMode);
        }
        self.write_cached(reg::CTRL3, (self.ctrl[2] & !MICROSTEP_MASK) | mode)
    }

    fn clear_faults(&mut self) -> Result<(), Self::Error> {
        // CLR_FLT self-clears, so it never enters the cache
        self.write_register(reg::CTRL4, self.ctrl[3] | CLR_FLT)
    }

    fn read_fault(&mut self) -> Result<u8, Self::Error> {
        self.read_register(reg::FAULT)
    }

    fn read_diag1(&mut self) -> Result<u8, Self::Error> {
        self.read_register(reg::DIAG1)
    }

    fn read_diag2(&mut self) -> Result<u8, Self::Error> {
        self.read_register(reg::DIAG2)
    }

    fn verify_settings_committed(&mut self) -> Result<bool, Self::Error> {
        self.verify_cached_registers()
    }
}
