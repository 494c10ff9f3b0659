//! RP2040-specific HAL for the VMSTEP controller firmware
//!
//! This crate provides RP2040 implementations of the shared `vmstep-hal`
//! traits on top of embassy-rp:
//!
//! - GPIO outputs (STEP, DIR, chip select) and switch inputs
//! - Blocking SPI master for the driver chip
//! - Buffered UART host link

#![no_std]

pub mod gpio;
pub mod spi;
pub mod uart;

pub use gpio::{PinInput, PinOutput};
pub use spi::{spi_config, SpiMaster};
pub use uart::{uart_config, LinkUart};
