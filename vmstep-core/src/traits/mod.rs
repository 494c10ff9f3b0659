//! Collaborator traits
//!
//! These traits define the interface between the controller logic and
//! hardware-specific implementations. The dispatcher receives them at
//! construction; host tests substitute fakes.

pub mod driver;
pub mod motion;
pub mod switch;

pub use driver::{DriverChip, FAULT_PIN_BIT};
pub use motion::MotionPlanner;
pub use switch::{NoSwitches, SwitchInputs, SwitchLevels};
