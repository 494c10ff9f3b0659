//! Board wiring
//!
//! | Signal        | GPIO | Peripheral |
//! |---------------|------|------------|
//! | Host TX       | 0    | UART0      |
//! | Host RX       | 1    | UART0      |
//! | Driver SCLK   | 2    | SPI0       |
//! | Driver SDI    | 3    | SPI0       |
//! | Driver SDO    | 4    | SPI0       |
//! | Driver nSCS   | 5    |            |
//! | STEP          | 6    |            |
//! | DIR           | 7    |            |
//! | Limit 1       | 8    |            |
//! | Limit 2       | 9    |            |
//! | Home          | 10   |            |
//!
//! Switch inputs are pulled up; polarity is a runtime setting.

use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{PIN_0, PIN_1, SPI0, UART0};
use embassy_rp::spi::{Blocking, Spi};
use embassy_rp::{Peri, Peripherals};
use embassy_time::Delay;
use vmstep_core::{ControlLoop, Dispatcher};
use vmstep_drivers::{AccelStepper, Drv8434s, SwitchPins};
use vmstep_hal::SpiConfig;
use vmstep_hal_rp2040::{spi_config, PinInput, PinOutput, SpiMaster};

/// Host link receive ring size
pub const LINK_RX_BUF: usize = 64;
/// Host link transmit ring size
pub const LINK_TX_BUF: usize = 64;

pub type Planner = AccelStepper<PinOutput<'static>, PinOutput<'static>, Delay>;
pub type Driver = Drv8434s<SpiMaster<Spi<'static, SPI0, Blocking>>, PinOutput<'static>>;
pub type Switches = SwitchPins<PinInput<'static>, PinInput<'static>, PinInput<'static>>;
pub type Controller = ControlLoop<Planner, Driver, Switches, Delay>;

/// Motion-side peripherals, built from the pins above
pub struct Axis {
    pub planner: Planner,
    pub driver: Driver,
    pub switches: Switches,
}

/// Host link peripherals, left unconfigured
pub struct Link {
    pub uart: Peri<'static, UART0>,
    pub tx: Peri<'static, PIN_0>,
    pub rx: Peri<'static, PIN_1>,
}

/// Claim the board pins
///
/// The planner starts at the slowest speed limits; the dispatcher pushes
/// the configured ones during init.
pub fn split(p: Peripherals) -> (Axis, Link) {
    let spi = Spi::new_blocking(
        p.SPI0,
        p.PIN_2,
        p.PIN_3,
        p.PIN_4,
        spi_config(&SpiConfig::DRIVER),
    );
    let cs = PinOutput::new(Output::new(p.PIN_5, Level::High));
    let driver = Drv8434s::new(SpiMaster::new(spi), cs);

    let step = PinOutput::new(Output::new(p.PIN_6, Level::Low));
    let dir = PinOutput::new(Output::new(p.PIN_7, Level::Low));
    let planner = AccelStepper::new(step, dir, Delay, 1, 1);

    let switches = SwitchPins::new(
        PinInput::new(Input::new(p.PIN_8, Pull::Up)),
        PinInput::new(Input::new(p.PIN_9, Pull::Up)),
        PinInput::new(Input::new(p.PIN_10, Pull::Up)),
    );

    let axis = Axis {
        planner,
        driver,
        switches,
    };
    let link = Link {
        uart: p.UART0,
        tx: p.PIN_0,
        rx: p.PIN_1,
    };
    (axis, link)
}

/// Assemble the control loop around the axis
pub fn controller(axis: Axis) -> Controller {
    ControlLoop::new(Dispatcher::new(
        axis.planner,
        axis.driver,
        axis.switches,
        Delay,
    ))
}
