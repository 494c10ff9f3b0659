//! GPIO pin abstractions
//!
//! Digital outputs drive STEP/DIR and the driver chip select; digital inputs
//! read limit and home switches.

/// Digital output pin
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

/// Digital input pin
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// Electrical level at which a switch input counts as triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveLevel {
    /// Triggered when the pin reads low (pulled-up, switch to ground)
    Low,
    /// Triggered when the pin reads high
    High,
}

impl ActiveLevel {
    /// Polarity bit as carried in the settings flags (0 = low, 1 = high)
    pub fn from_polarity_bit(bit: bool) -> Self {
        if bit {
            ActiveLevel::High
        } else {
            ActiveLevel::Low
        }
    }

    /// Evaluate a raw pin level
    pub fn is_active(self, pin_high: bool) -> bool {
        match self {
            ActiveLevel::Low => !pin_high,
            ActiveLevel::High => pin_high,
        }
    }
}

impl<T: OutputPin + ?Sized> OutputPin for &mut T {
    fn set_high(&mut self) {
        (**self).set_high()
    }

    fn set_low(&mut self) {
        (**self).set_low()
    }
}
