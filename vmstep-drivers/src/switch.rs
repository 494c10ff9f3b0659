//! Limit and home switch inputs on GPIO pins

use vmstep_core::traits::{SwitchInputs, SwitchLevels};
use vmstep_hal::InputPin;

/// The three switch inputs of the controller board
///
/// Levels are reported raw; polarity and enables come from the settings.
pub struct SwitchPins<L1, L2, H> {
    limit1: L1,
    limit2: L2,
    home: H,
}

impl<L1, L2, H> SwitchPins<L1, L2, H>
where
    L1: InputPin,
    L2: InputPin,
    H: InputPin,
{
    pub fn new(limit1: L1, limit2: L2, home: H) -> Self {
        Self {
            limit1,
            limit2,
            home,
        }
    }
}

impl<L1, L2, H> SwitchInputs for SwitchPins<L1, L2, H>
where
    L1: InputPin,
    L2: InputPin,
    H: InputPin,
{
    fn sample(&mut self) -> SwitchLevels {
        SwitchLevels {
            limit1_high: self.limit1.is_high(),
            limit2_high: self.limit2.is_high(),
            home_high: self.home.is_high(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Level(bool);

    impl InputPin for Level {
        fn is_high(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_sample_reports_raw_levels() {
        let mut pins = SwitchPins::new(Level(true), Level(false), Level(true));
        assert_eq!(
            pins.sample(),
            SwitchLevels {
                limit1_high: true,
                limit2_high: false,
                home_high: true,
            }
        );
    }
}
