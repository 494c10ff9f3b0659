//! Device identity strings returned by QUERY

/// Identity reported to the host
///
/// Strings must stay marker-free and within the reply payload limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    /// QUERY(MODEL_NO)
    pub model: &'static str,
    /// QUERY(SERIAL_NO)
    pub serial: &'static str,
    /// QUERY(FIRMWARE)
    pub firmware: &'static str,
}

impl DeviceInfo {
    pub const VMSTEP: DeviceInfo = DeviceInfo {
        model: "VMSTEP",
        serial: "2024_01.02",
        firmware: "00.02",
    };
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::VMSTEP
    }
}
