//! VMSTEP Hardware Abstraction Layer
//!
//! This crate defines the hardware capability traits that the controller
//! logic is written against. Chip-specific crates (currently
//! `vmstep-hal-rp2040`) implement them, and host tests substitute fakes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  vmstep-core / vmstep-drivers           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  vmstep-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ vmstep-hal-   │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`uart::ByteTransport`] - Host link byte stream
//! - [`spi::SpiBus`] - SPI bus operations

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod spi;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use gpio::{ActiveLevel, InputPin, OutputPin};
pub use spi::{SpiBus, SpiConfig};
pub use uart::{ByteTransport, UartConfig};
