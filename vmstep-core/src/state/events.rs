//! Events that trigger state transitions

use crate::safety::HardwareFault;

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Host commands
    /// GOTO accepted
    MoveStarted,
    /// HOME accepted
    HomingStarted,
    /// STOP accepted
    Stop,
    /// ENABLE accepted
    Enable,
    /// DISABLE accepted
    Disable,
    /// RESET cleared the latched fault
    FaultsCleared,

    // Collaborator events
    /// Planner reached its target
    MotionComplete,
    /// Hardware fault detected
    FaultDetected(HardwareFault),
}
