//! Limit and home switch inputs

/// Raw electrical levels of the switch inputs
///
/// Polarity is applied by the controller according to the settings flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchLevels {
    pub limit1_high: bool,
    pub limit2_high: bool,
    pub home_high: bool,
}

/// Trait for sampling the switch inputs
pub trait SwitchInputs {
    /// Sample all switch pins
    fn sample(&mut self) -> SwitchLevels;
}

/// Board without switches wired
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSwitches;

impl SwitchInputs for NoSwitches {
    fn sample(&mut self) -> SwitchLevels {
        SwitchLevels::default()
    }
}
