//! Settings validation and the driver verification poll

use embedded_hal::delay::DelayNs;
use vmstep_protocol::SETTINGS_LEN;

use super::record::{Settings, SettingsError};
use crate::traits::DriverChip;

/// Validate a raw settings record
///
/// All-or-nothing: the first violation rejects the whole record.
pub fn validate(raw: &[u8; SETTINGS_LEN]) -> Result<Settings, SettingsError> {
    Settings::from_bytes(raw)
}

/// Bounded retry with a fixed backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Retry {
    /// Maximum number of attempts (at least one is always made)
    pub attempts: u8,
    /// Delay between attempts in milliseconds
    pub backoff_ms: u32,
}

impl Retry {
    /// Policy used for driver settings verification
    pub const VERIFY: Retry = Retry {
        attempts: 10,
        backoff_ms: 10,
    };

    /// Poll `check` until it reports success or the attempts run out
    ///
    /// Errors from `check` count as failed attempts. Returns the number of
    /// attempts used on success.
    pub fn run<D, F, E>(&self, delay: &mut D, mut check: F) -> Option<u8>
    where
        D: DelayNs,
        F: FnMut() -> Result<bool, E>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            if let Ok(true) = check() {
                return Some(attempt);
            }
            if attempt < attempts {
                delay.delay_ms(self.backoff_ms);
            }
        }
        None
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::VERIFY
    }
}

/// Wait until the driver confirms it holds the written configuration
pub fn verify_applied<D, W>(driver: &mut D, delay: &mut W, retry: Retry) -> bool
where
    D: DriverChip,
    W: DelayNs,
{
    retry
        .run(delay, || driver.verify_settings_committed())
        .is_some()
}
