//! GPIO adapters
//!
//! Wrap embassy-rp pins so drivers can stay generic over `vmstep-hal`.

use embassy_rp::gpio::{Input, Output};

/// Push-pull output (STEP, DIR, chip select)
pub struct PinOutput<'d>(Output<'d>);

impl<'d> PinOutput<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self(pin)
    }
}

impl vmstep_hal::OutputPin for PinOutput<'_> {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }
}

/// Digital input (limit and home switches)
///
/// Pull configuration is chosen when the `Input` is created.
pub struct PinInput<'d>(Input<'d>);

impl<'d> PinInput<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self(pin)
    }
}

impl vmstep_hal::InputPin for PinInput<'_> {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}
