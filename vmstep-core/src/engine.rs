//! Cooperative control loop
//!
//! One [`ControlLoop::poll`] call is one iteration:
//! 1. drain input bytes into the decoder until a frame is pending
//! 2. dispatch at most one pending frame and send its reply
//! 3. service the collaborators and send any unsolicited reply
//!
//! Bytes that arrive while a frame is pending stay in the transport.

use embedded_hal::delay::DelayNs;
use vmstep_hal::ByteTransport;
use vmstep_protocol::{FrameDecoder, FrameEvent, FramingError, Reply};

use crate::dispatch::Dispatcher;
use crate::traits::{DriverChip, MotionPlanner, SwitchInputs};

/// Running counters for the host link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Frames handed to the dispatcher
    pub frames: u32,
    /// Partial frames discarded by the decoder
    pub framing_errors: u32,
    /// Replies sent with the FAULT code
    pub faults_sent: u32,
}

/// A frame handled during one iteration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handled {
    /// Command code of the frame
    pub code: u8,
    pub reply: Reply,
}

/// What happened during one iteration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    /// Last framing error seen while draining input
    pub framing_error: Option<FramingError>,
    /// Frame dispatched in this iteration
    pub handled: Option<Handled>,
    /// DONE or fault report raised by the collaborators
    pub unsolicited: Option<Reply>,
}

impl PollOutcome {
    /// Check if nothing happened
    pub fn is_idle(&self) -> bool {
        self.framing_error.is_none() && self.handled.is_none() && self.unsolicited.is_none()
    }
}

/// Decoder plus dispatcher driven from a single task
pub struct ControlLoop<M, D, S, W> {
    decoder: FrameDecoder,
    dispatcher: Dispatcher<M, D, S, W>,
    stats: LinkStats,
}

impl<M, D, S, W> ControlLoop<M, D, S, W>
where
    M: MotionPlanner,
    D: DriverChip,
    S: SwitchInputs,
    W: DelayNs,
{
    pub fn new(dispatcher: Dispatcher<M, D, S, W>) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            dispatcher,
            stats: LinkStats::default(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<M, D, S, W> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<M, D, S, W> {
        &mut self.dispatcher
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Run one loop iteration
    pub fn poll<T: ByteTransport>(&mut self, transport: &mut T, now_ms: u32) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        while !self.decoder.is_pending() && transport.bytes_available() > 0 {
            let Some(byte) = transport.read_byte() else {
                break;
            };
            if let FrameEvent::Error(e) = self.decoder.feed(byte) {
                self.stats.framing_errors = self.stats.framing_errors.wrapping_add(1);
                outcome.framing_error = Some(e);
            }
        }

        if let Some(frame) = self.decoder.take_frame() {
            self.stats.frames = self.stats.frames.wrapping_add(1);
            let reply = self.dispatcher.handle(&frame);
            self.send(transport, &reply);
            outcome.handled = Some(Handled {
                code: frame.code(),
                reply,
            });
        }

        if let Some(reply) = self.dispatcher.service(now_ms) {
            self.send(transport, &reply);
            outcome.unsolicited = Some(reply);
        }

        outcome
    }

    fn send<T: ByteTransport>(&mut self, transport: &mut T, reply: &Reply) {
        if reply.fault_code().is_some() {
            self.stats.faults_sent = self.stats.faults_sent.wrapping_add(1);
        }
        transport.write_bytes(&reply.encode_to_vec());
    }
}
