//! Command dispatch
//!
//! Turns decoded frames into collaborator calls and replies, gated by the
//! controller state and the fault allow-list.

pub mod dispatcher;
pub mod identity;

pub use dispatcher::{Dispatcher, HOMING_TRAVEL_STEPS};
pub use identity::DeviceInfo;
