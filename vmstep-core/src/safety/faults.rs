//! Hardware fault classification
//!
//! Register bit meanings follow the DRV8434S datasheet.

use vmstep_protocol::{FaultCode, Reply};

/// Snapshot of the driver fault registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultRegisters {
    pub fault: u8,
    pub diag1: u8,
    pub diag2: u8,
}

impl FaultRegisters {
    /// Wire order: fault, diag1, diag2
    pub fn to_bytes(self) -> [u8; 3] {
        [self.fault, self.diag1, self.diag2]
    }

    /// Iterate over every named condition flagged in the snapshot
    pub fn conditions(self) -> impl Iterator<Item = DriverCondition> {
        DriverCondition::ALL
            .into_iter()
            .filter(move |c| c.is_set(&self))
    }

    /// Snapshot carried by a FAULT(DRIVER) reply
    pub fn from_driver_report(reply: &Reply) -> Option<Self> {
        match (reply.fault_code(), reply.payload()) {
            (Some(FaultCode::Driver), [_, fault, diag1, diag2]) => Some(Self {
                fault: *fault,
                diag1: *diag1,
                diag2: *diag2,
            }),
            _ => None,
        }
    }
}

/// Register a condition bit lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Fault,
    Diag1,
    Diag2,
}

/// Named driver conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverCondition {
    // FAULT register
    FaultPin,
    SpiError,
    UnderVoltage,
    ChargePump,
    OverCurrent,
    Stall,
    Thermal,
    OpenLoad,
    // DIAG1: per-FET overcurrent
    OverCurrentBLowSide2,
    OverCurrentBHighSide2,
    OverCurrentBLowSide1,
    OverCurrentBHighSide1,
    OverCurrentALowSide2,
    OverCurrentAHighSide2,
    OverCurrentALowSide1,
    OverCurrentAHighSide1,
    // DIAG2
    OverTempWarning,
    OverTempShutdown,
    StallLearned,
    StallDetected,
    OpenLoadB,
    OpenLoadA,
}

impl DriverCondition {
    pub const ALL: [DriverCondition; 22] = [
        DriverCondition::FaultPin,
        DriverCondition::SpiError,
        DriverCondition::UnderVoltage,
        DriverCondition::ChargePump,
        DriverCondition::OverCurrent,
        DriverCondition::Stall,
        DriverCondition::Thermal,
        DriverCondition::OpenLoad,
        DriverCondition::OverCurrentBLowSide2,
        DriverCondition::OverCurrentBHighSide2,
        DriverCondition::OverCurrentBLowSide1,
        DriverCondition::OverCurrentBHighSide1,
        DriverCondition::OverCurrentALowSide2,
        DriverCondition::OverCurrentAHighSide2,
        DriverCondition::OverCurrentALowSide1,
        DriverCondition::OverCurrentAHighSide1,
        DriverCondition::OverTempWarning,
        DriverCondition::OverTempShutdown,
        DriverCondition::StallLearned,
        DriverCondition::StallDetected,
        DriverCondition::OpenLoadB,
        DriverCondition::OpenLoadA,
    ];

    /// Register and bit position of this condition
    pub fn location(self) -> (Register, u8) {
        use DriverCondition::*;
        match self {
            FaultPin => (Register::Fault, 7),
            SpiError => (Register::Fault, 6),
            UnderVoltage => (Register::Fault, 5),
            ChargePump => (Register::Fault, 4),
            OverCurrent => (Register::Fault, 3),
            Stall => (Register::Fault, 2),
            Thermal => (Register::Fault, 1),
            OpenLoad => (Register::Fault, 0),
            OverCurrentBLowSide2 => (Register::Diag1, 7),
            OverCurrentBHighSide2 => (Register::Diag1, 6),
            OverCurrentBLowSide1 => (Register::Diag1, 5),
            OverCurrentBHighSide1 => (Register::Diag1, 4),
            OverCurrentALowSide2 => (Register::Diag1, 3),
            OverCurrentAHighSide2 => (Register::Diag1, 2),
            OverCurrentALowSide1 => (Register::Diag1, 1),
            OverCurrentAHighSide1 => (Register::Diag1, 0),
            OverTempWarning => (Register::Diag2, 6),
            OverTempShutdown => (Register::Diag2, 5),
            StallLearned => (Register::Diag2, 4),
            StallDetected => (Register::Diag2, 3),
            OpenLoadB => (Register::Diag2, 1),
            OpenLoadA => (Register::Diag2, 0),
        }
    }

    /// Check whether this condition is flagged in a snapshot
    pub fn is_set(self, regs: &FaultRegisters) -> bool {
        let (register, bit) = self.location();
        let value = match register {
            Register::Fault => regs.fault,
            Register::Diag1 => regs.diag1,
            Register::Diag2 => regs.diag2,
        };
        value & (1 << bit) != 0
    }

    /// Informational conditions that do not stop the motor
    pub fn is_warning(self) -> bool {
        matches!(
            self,
            DriverCondition::OverTempWarning | DriverCondition::StallLearned
        )
    }
}

/// Latched hardware faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareFault {
    /// Driver chip asserted its fault output
    Driver,
    /// Driver did not confirm the written settings
    DriverSync,
    /// Limit switch 1 tripped during motion
    Limit1,
    /// Limit switch 2 tripped during motion
    Limit2,
    /// Homing ended without reaching the home switch
    Home,
}

impl HardwareFault {
    /// Fault sub-code reported to the host
    pub fn fault_code(self) -> FaultCode {
        match self {
            HardwareFault::Driver => FaultCode::Driver,
            HardwareFault::DriverSync => FaultCode::DriverSync,
            HardwareFault::Limit1 => FaultCode::Limit1,
            HardwareFault::Limit2 => FaultCode::Limit2,
            HardwareFault::Home => FaultCode::Home,
        }
    }
}
