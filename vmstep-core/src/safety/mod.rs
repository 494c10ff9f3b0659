//! Safety monitoring
//!
//! Classifies driver register contents and the hardware faults that latch
//! the controller.

pub mod faults;

pub use faults::{DriverCondition, FaultRegisters, HardwareFault, Register};
