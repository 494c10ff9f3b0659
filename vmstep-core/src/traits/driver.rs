//! Stepper driver chip trait
//!
//! This trait abstracts over SPI-configured stepper drivers (DRV8434S and
//! similar) that own current regulation, microstepping and fault detection.

use crate::safety::FaultRegisters;

/// Bit of the fault register that mirrors the nFAULT output
pub const FAULT_PIN_BIT: u8 = 1 << 7;

/// Trait for stepper driver chips
pub trait DriverChip {
    /// Bus or chip error
    type Error: core::fmt::Debug;

    /// Energize the output bridges
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// De-energize the output bridges
    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Set the current level (0 = lowest, 15 = full scale)
    fn set_current(&mut self, level: u8) -> Result<(), Self::Error>;

    /// Set the microstep mode (raw 4-bit mode value)
    fn set_microstep(&mut self, mode: u8) -> Result<(), Self::Error>;

    /// Clear latched fault conditions
    fn clear_faults(&mut self) -> Result<(), Self::Error>;

    /// Read the fault status register
    fn read_fault(&mut self) -> Result<u8, Self::Error>;

    /// Read diagnostic register 1
    fn read_diag1(&mut self) -> Result<u8, Self::Error>;

    /// Read diagnostic register 2
    fn read_diag2(&mut self) -> Result<u8, Self::Error>;

    /// Check that the chip holds the last written configuration
    fn verify_settings_committed(&mut self) -> Result<bool, Self::Error>;

    /// Check whether the chip is signalling a fault
    fn fault_active(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_fault()? & FAULT_PIN_BIT != 0)
    }

    /// Read a fresh snapshot of all fault registers
    fn read_fault_registers(&mut self) -> Result<FaultRegisters, Self::Error> {
        Ok(FaultRegisters {
            fault: self.read_fault()?,
            diag1: self.read_diag1()?,
            diag2: self.read_diag2()?,
        })
    }
}
