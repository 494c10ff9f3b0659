//! Controller state machine
//!
//! Motion and driver behavior is a function of the current state and an
//! event. Faulted and motion states are mutually exclusive: a fault event
//! always leaves the motion states.

use vmstep_protocol::{Command, DeviceMode};

use super::events::Event;
use crate::safety::HardwareFault;

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    /// Driver enabled, no commanded motion; the planner may still be braking after STOP
    #[default]
    Idle,
    /// Moving toward a GOTO target
    Moving,
    /// Running the homing sequence
    Homing,
    /// Hardware fault latched; only RESET, QUERY and ECHO are accepted
    Faulted(HardwareFault),
    /// Driver outputs off
    Disabled,
}

impl ControllerState {
    /// Check if the planner is (or may be) producing steps
    pub fn in_motion(&self) -> bool {
        matches!(self, ControllerState::Moving | ControllerState::Homing)
    }

    /// Check if a fault is latched
    pub fn is_faulted(&self) -> bool {
        matches!(self, ControllerState::Faulted(_))
    }

    /// Latched fault, if any
    pub fn fault(&self) -> Option<HardwareFault> {
        match self {
            ControllerState::Faulted(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Check the state precondition of a command
    ///
    /// The fault allow-list is checked separately, before argument decoding.
    pub fn permits(&self, command: Command) -> bool {
        use ControllerState::*;

        match command {
            Command::Goto | Command::Home => !matches!(self, Faulted(_) | Disabled),
            Command::UpdateParameters | Command::ResetPosition => !self.in_motion(),
            Command::Enable | Command::Disable | Command::Stop => !self.is_faulted(),
            Command::Reset | Command::Query | Command::Echo => true,
        }
    }

    /// Mode reported by QUERY(MODE)
    pub fn device_mode(&self) -> DeviceMode {
        match self {
            ControllerState::Idle => DeviceMode::Idle,
            ControllerState::Moving => DeviceMode::Moving,
            ControllerState::Homing => DeviceMode::Homing,
            ControllerState::Faulted(_) => DeviceMode::Fault,
            ControllerState::Disabled => DeviceMode::Sleep,
        }
    }

    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use ControllerState::*;
        use Event::*;

        match (self, event) {
            // The first latched cause is kept until RESET
            (Faulted(_), FaultDetected(_)) => self,
            (_, FaultDetected(kind)) => Faulted(kind),

            // Faulted transitions
            (Faulted(_), FaultsCleared) => Idle,

            // Idle transitions
            (Idle, MoveStarted) => Moving,
            (Idle, HomingStarted) => Homing,
            (Idle, Disable) => Disabled,

            // Moving transitions
            (Moving, MoveStarted) => Moving,
            (Moving, HomingStarted) => Homing,
            (Moving, MotionComplete) => Idle,
            (Moving, Stop) => Idle,
            (Moving, Disable) => Disabled,

            // Homing transitions
            (Homing, MoveStarted) => Moving,
            (Homing, HomingStarted) => Homing,
            (Homing, MotionComplete) => Idle,
            (Homing, Stop) => Idle,
            (Homing, Disable) => Disabled,

            // Disabled transitions
            (Disabled, Enable) => Idle,

            // Default: stay in current state
            _ => self,
        }
    }
}
