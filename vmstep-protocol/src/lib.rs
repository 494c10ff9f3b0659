//! VMSTEP host link protocol
//!
//! This crate defines the serial protocol between a host PC and the VMSTEP
//! single-axis stepper controller. Both directions share one frame shape:
//!
//! ```text
//! ┌───────┬──────┬──────────────┬─────┐
//! │ START │ CODE │ PAYLOAD      │ END │
//! │ '['   │ 1B   │ 0–30B        │ ']' │
//! └───────┴──────┴──────────────┴─────┘
//! ```
//!
//! Host → controller frames carry a command code, controller → host frames
//! carry a reply code. There is no length field and no checksum: the end
//! marker terminates the frame, and payload bytes equal to a marker are not
//! escaped. Payloads are expected to stay marker-free.
//!
//! - [`frame`] - incremental decoder for the inbound byte stream
//! - [`reply`] - outbound frame encoder
//! - [`messages`] - command, query, reply and fault vocabulary

#![no_std]
#![deny(unsafe_code)]

pub mod frame;
pub mod messages;
pub mod reply;

pub use frame::{
    Frame, FrameDecoder, FrameError, FrameEvent, FramingError, ReceiverState, END_MARKER,
    FRAME_CAPACITY, MAX_ARGS, MAX_FRAME_LEN, START_MARKER,
};
pub use messages::{
    Command, DeviceMode, FaultCode, ProtocolError, QueryKind, ReplyCode, Request, SETTINGS_LEN,
};
pub use reply::{Reply, MAX_REPLY_FRAME, MAX_REPLY_PAYLOAD};
