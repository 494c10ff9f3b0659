//! VMSTEP - Single-axis stepper controller firmware
//!
//! Main firmware binary for RP2040-based controller boards with a DRV8434S
//! driver. The host drives the axis over a bracket-framed serial protocol
//! at 19200 baud; all motion, fault and settings policy lives in
//! `vmstep-core`.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Uart};
use static_cell::StaticCell;
use vmstep_core::traits::DriverChip;
use vmstep_hal::UartConfig;
use vmstep_hal_rp2040::{uart_config, LinkUart};
use {defmt_rtt as _, panic_probe as _};

mod board;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; board::LINK_TX_BUF]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; board::LINK_RX_BUF]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("VMSTEP firmware starting...");

    let p = embassy_rp::init(Default::default());
    let (mut axis, link) = board::split(p);
    info!("Peripherals initialized");

    // Reset the driver to its power-on register values
    if let Err(e) = axis.driver.init() {
        error!("DRV8434S init failed: {}", Debug2Format(&e));
    }
    match axis.driver.read_fault_registers() {
        Ok(regs) => debug!("Driver registers at boot: {}", regs),
        Err(e) => warn!("Driver status read failed: {}", Debug2Format(&e)),
    }

    let mut control = board::controller(axis);
    match control.dispatcher_mut().init() {
        Ok(()) => info!("Driver configured, controller idle"),
        Err(kind) => error!("Driver configuration failed: {}", kind),
    }

    let tx_buf = TX_BUF.init([0u8; board::LINK_TX_BUF]);
    let rx_buf = RX_BUF.init([0u8; board::LINK_RX_BUF]);
    let uart = Uart::new_blocking(link.uart, link.tx, link.rx, uart_config(&UartConfig::LINK));
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    info!("Host link on UART0 at {} baud", UartConfig::LINK.baudrate);

    spawner
        .spawn(tasks::control_task(control, LinkUart::new(uart)))
        .unwrap();
    info!("Control task spawned, firmware running");
}
