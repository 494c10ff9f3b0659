//! Board-agnostic controller logic for the VMSTEP stepper controller
//!
//! This crate contains all controller logic that does not depend on
//! specific hardware implementations:
//!
//! - Collaborator traits (motion planner, driver chip, switch inputs)
//! - Controller state machine
//! - Settings record, validation and verification retry
//! - Driver fault classification
//! - Command dispatcher and the cooperative control loop

#![no_std]
#![deny(unsafe_code)]

pub mod dispatch;
pub mod engine;
pub mod safety;
pub mod settings;
pub mod state;
pub mod traits;

pub use dispatch::{DeviceInfo, Dispatcher};
pub use engine::{ControlLoop, Handled, LinkStats, PollOutcome};
