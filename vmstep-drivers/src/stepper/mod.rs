//! Stepper driver and step generation

pub mod accel;
pub mod drv8434s;

pub use accel::AccelStepper;
pub use drv8434s::{Drv8434s, Drv8434sError};
