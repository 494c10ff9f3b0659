//! Control task
//!
//! Single owner of the protocol engine, the driver and the planner. The
//! planner is polled on every pass so step timing stays tight; the link
//! and the dispatcher are serviced once per millisecond.

use defmt::*;
use embassy_futures::yield_now;
use embassy_time::Instant;
use vmstep_core::safety::FaultRegisters;
use vmstep_core::PollOutcome;
use vmstep_hal_rp2040::LinkUart;

use crate::board::Controller;

/// Dispatcher service period
pub const SERVICE_INTERVAL_MS: u32 = 1;

#[embassy_executor::task]
pub async fn control_task(mut control: Controller, mut link: LinkUart) {
    info!("Control task started");

    let mut last_service_ms: Option<u32> = None;
    let mut rx_errors = 0u32;

    loop {
        let now = Instant::now();
        control
            .dispatcher_mut()
            .motion_mut()
            .run(now.as_micros() as u32);

        let now_ms = now.as_millis() as u32;
        let due = last_service_ms
            .map_or(true, |last| now_ms.wrapping_sub(last) >= SERVICE_INTERVAL_MS);
        if due {
            last_service_ms = Some(now_ms);
            let outcome = control.poll(&mut link, now_ms);
            if !outcome.is_idle() {
                log_outcome(&outcome);
            }
            if link.rx_errors() != rx_errors {
                rx_errors = link.rx_errors();
                warn!("UART receive errors: {}", rx_errors);
            }
        }

        yield_now().await;
    }
}

fn log_outcome(outcome: &PollOutcome) {
    if let Some(e) = outcome.framing_error {
        warn!("Framing error: {}", e);
    }
    if let Some(handled) = &outcome.handled {
        match handled.reply.fault_code() {
            Some(code) => warn!("Command '{}' rejected: {}", handled.code as char, code),
            None => debug!("Command '{}' -> {}", handled.code as char, handled.reply.code()),
        }
    }
    if let Some(reply) = &outcome.unsolicited {
        match reply.fault_code() {
            Some(code) => error!("Fault latched: {}", code),
            None => info!("Motion complete"),
        }
        if let Some(regs) = FaultRegisters::from_driver_report(reply) {
            log_driver_conditions(regs);
        }
    }
}

fn log_driver_conditions(regs: FaultRegisters) {
    for condition in regs.conditions() {
        if condition.is_warning() {
            warn!("Driver warning: {}", condition);
        } else {
            error!("Driver condition: {}", condition);
        }
    }
}
