//! Settings record
//!
//! Wire layout (12 bytes, little-endian):
//!
//! ```text
//! byte 0      run current (bits 0-3) | sleep current (bits 4-7)
//! byte 1      microstep mode (bits 0-3) | reserved (bits 4-7, zero)
//! byte 2      sleep timeout, 10 ms units
//! bytes 3-6   top speed, steps/s
//! bytes 7-10  acceleration, steps/s²
//! byte 11     switch flags (bits 6-7 reserved, zero)
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vmstep_hal::ActiveLevel;
use vmstep_protocol::SETTINGS_LEN;

/// Largest value of a 4-bit field
pub const NIBBLE_MAX: u8 = 0x0F;

/// Highest microstep mode (1/256 step)
pub const MICROSTEP_MAX: u8 = 0b1010;

/// Microstep mode for 1/16 step
pub const MICROSTEP_16: u8 = 0b0110;

/// Top speed limits in steps/s
pub const TOP_SPEED_MIN: u32 = 1;
pub const TOP_SPEED_MAX: u32 = 100_000;

/// Acceleration limits in steps/s²
pub const ACCEL_MIN: u32 = 1;
pub const ACCEL_MAX: u32 = 1_000_000;

const FLAGS_RESERVED: u8 = 0b1100_0000;

/// Reasons a settings record is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// Current level does not fit in 4 bits
    CurrentOutOfRange,
    /// Microstep mode above 1/256
    MicrostepOutOfRange,
    /// Reserved bits are set
    ReservedBitsSet,
    /// Top speed outside the supported range
    TopSpeedOutOfRange,
    /// Acceleration outside the supported range
    AccelOutOfRange,
}

/// Limit and home switch configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SwitchFlags {
    pub enable_limit1: bool,
    pub enable_limit2: bool,
    pub enable_home: bool,
    /// Polarity bits: set means the switch is active high
    pub limit1_polarity: bool,
    pub limit2_polarity: bool,
    pub home_polarity: bool,
}

impl SwitchFlags {
    /// Decode the flags byte, rejecting reserved bits
    pub fn from_byte(byte: u8) -> Result<Self, SettingsError> {
        if byte & FLAGS_RESERVED != 0 {
            return Err(SettingsError::ReservedBitsSet);
        }
        Ok(Self {
            enable_limit1: byte & (1 << 0) != 0,
            enable_limit2: byte & (1 << 1) != 0,
            enable_home: byte & (1 << 2) != 0,
            limit1_polarity: byte & (1 << 3) != 0,
            limit2_polarity: byte & (1 << 4) != 0,
            home_polarity: byte & (1 << 5) != 0,
        })
    }

    /// Encode to the flags byte
    pub fn to_byte(self) -> u8 {
        (self.enable_limit1 as u8)
            | (self.enable_limit2 as u8) << 1
            | (self.enable_home as u8) << 2
            | (self.limit1_polarity as u8) << 3
            | (self.limit2_polarity as u8) << 4
            | (self.home_polarity as u8) << 5
    }

    /// Active level of limit switch 1
    pub fn limit1_level(self) -> ActiveLevel {
        ActiveLevel::from_polarity_bit(self.limit1_polarity)
    }

    /// Active level of limit switch 2
    pub fn limit2_level(self) -> ActiveLevel {
        ActiveLevel::from_polarity_bit(self.limit2_polarity)
    }

    /// Active level of the home switch
    pub fn home_level(self) -> ActiveLevel {
        ActiveLevel::from_polarity_bit(self.home_polarity)
    }
}

/// Validated controller settings
///
/// Fields are private so that every instance satisfies the width and range
/// limits; use the setters or [`Settings::from_bytes`] to change them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Settings {
    run_current: u8,
    sleep_current: u8,
    microstep: u8,
    sleep_timeout: u8,
    top_speed: u32,
    acceleration: u32,
    flags: SwitchFlags,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_current: 0,
            sleep_current: 0,
            microstep: MICROSTEP_16,
            sleep_timeout: 100,
            top_speed: 2000,
            acceleration: 4000,
            flags: SwitchFlags::default(),
        }
    }
}

impl Settings {
    /// Decode and validate a wire record
    ///
    /// Any violation rejects the whole record.
    pub fn from_bytes(raw: &[u8; SETTINGS_LEN]) -> Result<Self, SettingsError> {
        if raw[1] >> 4 != 0 {
            return Err(SettingsError::ReservedBitsSet);
        }

        let mut settings = Self::default();
        settings.set_run_current(raw[0] & NIBBLE_MAX)?;
        settings.set_sleep_current(raw[0] >> 4)?;
        settings.set_microstep(raw[1] & NIBBLE_MAX)?;
        settings.sleep_timeout = raw[2];
        settings.set_top_speed(u32::from_le_bytes([raw[3], raw[4], raw[5], raw[6]]))?;
        settings.set_acceleration(u32::from_le_bytes([raw[7], raw[8], raw[9], raw[10]]))?;
        settings.flags = SwitchFlags::from_byte(raw[11])?;
        Ok(settings)
    }

    /// Encode to the wire record
    pub fn to_bytes(&self) -> [u8; SETTINGS_LEN] {
        let mut raw = [0u8; SETTINGS_LEN];
        raw[0] = self.run_current | (self.sleep_current << 4);
        raw[1] = self.microstep;
        raw[2] = self.sleep_timeout;
        raw[3..7].copy_from_slice(&self.top_speed.to_le_bytes());
        raw[7..11].copy_from_slice(&self.acceleration.to_le_bytes());
        raw[11] = self.flags.to_byte();
        raw
    }

    pub fn run_current(&self) -> u8 {
        self.run_current
    }

    pub fn set_run_current(&mut self, level: u8) -> Result<(), SettingsError> {
        if level > NIBBLE_MAX {
            return Err(SettingsError::CurrentOutOfRange);
        }
        self.run_current = level;
        Ok(())
    }

    pub fn sleep_current(&self) -> u8 {
        self.sleep_current
    }

    pub fn set_sleep_current(&mut self, level: u8) -> Result<(), SettingsError> {
        if level > NIBBLE_MAX {
            return Err(SettingsError::CurrentOutOfRange);
        }
        self.sleep_current = level;
        Ok(())
    }

    pub fn microstep(&self) -> u8 {
        self.microstep
    }

    pub fn set_microstep(&mut self, mode: u8) -> Result<(), SettingsError> {
        if mode > MICROSTEP_MAX {
            return Err(SettingsError::MicrostepOutOfRange);
        }
        self.microstep = mode;
        Ok(())
    }

    /// Idle time before dropping to sleep current, in 10 ms units (0 = never)
    pub fn sleep_timeout(&self) -> u8 {
        self.sleep_timeout
    }

    pub fn set_sleep_timeout(&mut self, timeout: u8) {
        self.sleep_timeout = timeout;
    }

    /// Idle time before dropping to sleep current, in milliseconds
    pub fn sleep_timeout_ms(&self) -> Option<u32> {
        match self.sleep_timeout {
            0 => None,
            t => Some(t as u32 * 10),
        }
    }

    pub fn top_speed(&self) -> u32 {
        self.top_speed
    }

    pub fn set_top_speed(&mut self, speed: u32) -> Result<(), SettingsError> {
        if !(TOP_SPEED_MIN..=TOP_SPEED_MAX).contains(&speed) {
            return Err(SettingsError::TopSpeedOutOfRange);
        }
        self.top_speed = speed;
        Ok(())
    }

    pub fn acceleration(&self) -> u32 {
        self.acceleration
    }

    pub fn set_acceleration(&mut self, accel: u32) -> Result<(), SettingsError> {
        if !(ACCEL_MIN..=ACCEL_MAX).contains(&accel) {
            return Err(SettingsError::AccelOutOfRange);
        }
        self.acceleration = accel;
        Ok(())
    }

    pub fn flags(&self) -> SwitchFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: SwitchFlags) {
        self.flags = flags;
    }
}
