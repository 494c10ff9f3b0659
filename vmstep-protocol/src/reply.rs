//! Outbound frame encoding
//!
//! Replies use the same bracket framing as commands. The payload is written
//! verbatim: marker bytes inside it are not escaped, so text and data replies
//! must stay marker-free.

use heapless::Vec;

use crate::frame::{FrameError, END_MARKER, MAX_ARGS, START_MARKER};
use crate::messages::{FaultCode, ReplyCode};

/// Maximum reply payload size in bytes
pub const MAX_REPLY_PAYLOAD: usize = MAX_ARGS;

/// Maximum encoded reply size (START + CODE + payload + END)
pub const MAX_REPLY_FRAME: usize = MAX_REPLY_PAYLOAD + 3;

/// Encode a frame into `buffer`
///
/// Returns the number of bytes written.
pub fn encode(code: u8, payload: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_REPLY_PAYLOAD {
        return Err(FrameError::PayloadTooLarge);
    }
    let frame_len = payload.len() + 3;
    if buffer.len() < frame_len {
        return Err(FrameError::BufferTooSmall);
    }

    buffer[0] = START_MARKER;
    buffer[1] = code;
    buffer[2..2 + payload.len()].copy_from_slice(payload);
    buffer[2 + payload.len()] = END_MARKER;

    Ok(frame_len)
}

/// Encode a frame with no payload
pub fn encode_empty(code: u8, buffer: &mut [u8]) -> Result<usize, FrameError> {
    encode(code, &[], buffer)
}

/// Encode a frame with a single payload byte
pub fn encode_byte(code: u8, data: u8, buffer: &mut [u8]) -> Result<usize, FrameError> {
    encode(code, &[data], buffer)
}

/// Encode a frame with a text payload (no terminator appended)
pub fn encode_text(code: u8, text: &str, buffer: &mut [u8]) -> Result<usize, FrameError> {
    encode(code, text.as_bytes(), buffer)
}

/// A reply ready to be sent to the host
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reply {
    code: ReplyCode,
    payload: Vec<u8, MAX_REPLY_PAYLOAD>,
}

impl Reply {
    /// Create a reply with an arbitrary payload
    pub fn new(code: ReplyCode, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { code, payload })
    }

    /// Create a reply with no payload
    pub fn empty(code: ReplyCode) -> Self {
        Self {
            code,
            payload: Vec::new(),
        }
    }

    /// Create a reply from a fixed-size payload
    fn fixed<const LEN: usize>(code: ReplyCode, bytes: [u8; LEN]) -> Self {
        const { assert!(LEN <= MAX_REPLY_PAYLOAD) };
        match Vec::from_slice(&bytes) {
            Ok(payload) => Self { code, payload },
            // LEN fits, checked at compile time
            Err(()) => Self::empty(code),
        }
    }

    /// Create a reply carrying one byte
    pub fn byte(code: ReplyCode, data: u8) -> Self {
        Self::fixed(code, [data])
    }

    /// Create a reply carrying text
    pub fn text(code: ReplyCode, text: &str) -> Result<Self, FrameError> {
        Self::new(code, text.as_bytes())
    }

    /// Plain acknowledgement
    pub fn ack() -> Self {
        Self::empty(ReplyCode::Ack)
    }

    /// Motion finished at `position`
    pub fn done(position: i32) -> Self {
        Self::fixed(ReplyCode::Done, position.to_le_bytes())
    }

    /// Fault reply with the given sub-code
    pub fn fault(fault: FaultCode) -> Self {
        Self::byte(ReplyCode::Fault, fault.to_byte())
    }

    /// Driver fault reply carrying the register snapshot
    pub fn driver_fault(registers: [u8; 3]) -> Self {
        let [fault, diag1, diag2] = registers;
        Self::fixed(
            ReplyCode::Fault,
            [FaultCode::Driver.to_byte(), fault, diag1, diag2],
        )
    }

    /// Reply code
    pub fn code(&self) -> ReplyCode {
        self.code
    }

    /// Reply payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Fault sub-code, if this is a fault reply
    pub fn fault_code(&self) -> Option<FaultCode> {
        if self.code != ReplyCode::Fault {
            return None;
        }
        self.payload.first().copied().and_then(FaultCode::from_byte)
    }

    /// Encode this reply into a byte buffer
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        encode(self.code.to_byte(), &self.payload, buffer)
    }

    /// Encode this reply into a heapless Vec
    pub fn encode_to_vec(&self) -> Vec<u8, MAX_REPLY_FRAME> {
        let mut buffer = [0u8; MAX_REPLY_FRAME];
        // The payload is bounded by MAX_REPLY_PAYLOAD, so the frame always fits
        self.encode(&mut buffer)
            .ok()
            .and_then(|len| Vec::from_slice(&buffer[..len]).ok())
            .unwrap_or_default()
    }
}
