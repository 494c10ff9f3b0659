//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the collaborator traits
//! defined in vmstep-core:
//!
//! - Stepper driver chip (DRV8434S over SPI)
//! - Trapezoidal step planner on STEP/DIR outputs
//! - Limit and home switch inputs

#![no_std]
#![deny(unsafe_code)]

pub mod stepper;
pub mod switch;

pub use stepper::{AccelStepper, Drv8434s, Drv8434sError};
pub use switch::SwitchPins;
