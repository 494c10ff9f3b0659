//! Controller settings
//!
//! The settings record is replaced as a whole by UPDATE_PARAMETERS and read
//! back by QUERY(PARAMETERS). Values are width-checked, never masked.

pub mod gate;
pub mod record;

pub use gate::{validate, verify_applied, Retry};
pub use record::{Settings, SettingsError, SwitchFlags, MICROSTEP_16, MICROSTEP_MAX};
