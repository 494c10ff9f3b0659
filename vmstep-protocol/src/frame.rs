//! Frame decoding for the host link.
//!
//! Frame format:
//! - START (1 byte): `[` synchronization marker
//! - CODE (1 byte): command or reply code
//! - PAYLOAD (0-30 bytes): code-specific arguments
//! - END (1 byte): `]` terminator
//!
//! The decoder is fed one byte at a time. It holds at most one complete
//! frame; while that frame is pending no further bytes are accepted, so a
//! second frame can never overwrite the first.

use heapless::Vec;

/// Frame start marker
pub const START_MARKER: u8 = b'[';

/// Frame end marker
pub const END_MARKER: u8 = b']';

/// Receive buffer capacity in bytes
pub const FRAME_CAPACITY: usize = 32;

/// Longest accepted frame body (code + arguments)
pub const MAX_FRAME_LEN: usize = FRAME_CAPACITY - 1;

/// Longest accepted argument payload
pub const MAX_ARGS: usize = MAX_FRAME_LEN - 1;

/// Framing violations detected while decoding
///
/// These are recovered inside the decoder: the partial frame is dropped and
/// the stream resynchronizes on the next start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramingError {
    /// Start marker received while a frame was already being read
    DoubleStart,
    /// End marker received with no code byte
    EmptyPayload,
    /// Frame body exceeded the receive capacity
    Overflow,
}

/// Errors from constructing or encoding frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Result of feeding one byte to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameEvent {
    /// Nothing to report
    None,
    /// A complete frame is pending; collect it with [`FrameDecoder::take_frame`]
    FrameReady,
    /// The partial frame was discarded
    Error(FramingError),
}

/// Receiver state of the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiverState {
    /// No partial frame buffered, waiting for a start marker
    Waiting,
    /// Accumulating bytes between start and end markers
    Reading,
    /// A complete frame is buffered awaiting consumption
    Pending,
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    code: u8,
    payload: Vec<u8, MAX_ARGS>,
}

impl Frame {
    /// Create a frame with the given code and argument payload
    pub fn new(code: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { code, payload })
    }

    /// Create a frame with no payload
    pub fn empty(code: u8) -> Self {
        Self {
            code,
            payload: Vec::new(),
        }
    }

    /// Command (or reply) code
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Argument bytes following the code
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encode this frame for transmission
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        crate::reply::encode(self.code, &self.payload, buffer)
    }
}

/// Incremental decoder for the inbound byte stream
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: ReceiverState,
    buffer: Vec<u8, MAX_FRAME_LEN>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder in the Waiting state
    pub fn new() -> Self {
        Self {
            state: ReceiverState::Waiting,
            buffer: Vec::new(),
        }
    }

    /// Current receiver state
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// True while a decoded frame awaits [`FrameDecoder::take_frame`]
    pub fn is_pending(&self) -> bool {
        self.state == ReceiverState::Pending
    }

    fn reset(&mut self) {
        self.state = ReceiverState::Waiting;
        self.buffer.clear();
    }

    fn discard(&mut self, error: FramingError) -> FrameEvent {
        self.reset();
        FrameEvent::Error(error)
    }

    /// Feed a single byte to the decoder
    ///
    /// While a frame is pending the byte is not consumed and `FrameEvent::None`
    /// is returned; callers should check [`FrameDecoder::is_pending`] and drain
    /// the frame before reading more input.
    pub fn feed(&mut self, byte: u8) -> FrameEvent {
        match self.state {
            ReceiverState::Waiting => {
                if byte == START_MARKER {
                    self.buffer.clear();
                    self.state = ReceiverState::Reading;
                }
                // Anything before a start marker is line noise
                FrameEvent::None
            }
            ReceiverState::Reading => match byte {
                START_MARKER => self.discard(FramingError::DoubleStart),
                END_MARKER => {
                    if self.buffer.is_empty() {
                        self.discard(FramingError::EmptyPayload)
                    } else {
                        self.state = ReceiverState::Pending;
                        FrameEvent::FrameReady
                    }
                }
                _ => {
                    if self.buffer.push(byte).is_err() {
                        self.discard(FramingError::Overflow)
                    } else {
                        FrameEvent::None
                    }
                }
            },
            ReceiverState::Pending => FrameEvent::None,
        }
    }

    /// Take the pending frame, returning the decoder to Waiting
    ///
    /// Returns `None` if no frame is pending.
    pub fn take_frame(&mut self) -> Option<Frame> {
        if self.state != ReceiverState::Pending {
            return None;
        }

        let (&code, args) = self.buffer.split_first()?;
        // args.len() < MAX_FRAME_LEN, so this cannot fail
        let frame = Frame::new(code, args).ok();
        self.reset();
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> FrameEvent {
        let mut last = FrameEvent::None;
        for &b in bytes {
            last = decoder.feed(b);
        }
        last
    }

    #[test]
    fn test_simple_frame() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(feed_all(&mut decoder, b"[QF]"), FrameEvent::FrameReady);
        assert_eq!(decoder.state(), ReceiverState::Pending);

        let frame = decoder.take_frame().unwrap();
        assert_eq!(frame.code(), b'Q');
        assert_eq!(frame.payload(), b"F");
        assert_eq!(decoder.state(), ReceiverState::Waiting);
    }

    #[test]
    fn test_noise_before_start_is_ignored() {
        let mut decoder = FrameDecoder::new();
        for &b in b"xyz]\x00\xff" {
            assert_eq!(decoder.feed(b), FrameEvent::None);
            assert_eq!(decoder.state(), ReceiverState::Waiting);
        }
        assert_eq!(feed_all(&mut decoder, b"[S]"), FrameEvent::FrameReady);
        assert_eq!(decoder.take_frame().unwrap().code(), b'S');
    }

    #[test]
    fn test_empty_payload() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(START_MARKER), FrameEvent::None);
        assert_eq!(
            decoder.feed(END_MARKER),
            FrameEvent::Error(FramingError::EmptyPayload)
        );
        assert_eq!(decoder.state(), ReceiverState::Waiting);
        assert!(decoder.take_frame().is_none());
    }

    #[test]
    fn test_double_start_discards_partial() {
        let mut decoder = FrameDecoder::new();
        feed_all(&mut decoder, b"[GAB");
        assert_eq!(
            decoder.feed(START_MARKER),
            FrameEvent::Error(FramingError::DoubleStart)
        );
        assert_eq!(decoder.state(), ReceiverState::Waiting);

        // The next complete frame decodes cleanly
        assert_eq!(feed_all(&mut decoder, b"[E1]"), FrameEvent::FrameReady);
        let frame = decoder.take_frame().unwrap();
        assert_eq!(frame.code(), b'E');
        assert_eq!(frame.payload(), b"1");
    }

    #[test]
    fn test_max_length_frame_accepted() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(START_MARKER);
        for i in 0..MAX_FRAME_LEN {
            assert_eq!(decoder.feed(b'a' + (i % 20) as u8), FrameEvent::None);
        }
        assert_eq!(decoder.feed(END_MARKER), FrameEvent::FrameReady);

        let frame = decoder.take_frame().unwrap();
        assert_eq!(frame.payload().len(), MAX_ARGS);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(START_MARKER);
        for _ in 0..MAX_FRAME_LEN {
            assert_eq!(decoder.feed(b'x'), FrameEvent::None);
        }
        assert_eq!(
            decoder.feed(b'x'),
            FrameEvent::Error(FramingError::Overflow)
        );
        assert_eq!(decoder.state(), ReceiverState::Waiting);

        // Trailing bytes and the stray end marker are noise now
        assert_eq!(feed_all(&mut decoder, b"xx]"), FrameEvent::None);
        assert!(decoder.take_frame().is_none());
    }

    #[test]
    fn test_pending_blocks_new_frames() {
        let mut decoder = FrameDecoder::new();
        feed_all(&mut decoder, b"[S]");
        assert!(decoder.is_pending());

        // A second frame does not replace the first
        assert_eq!(feed_all(&mut decoder, b"[H\x01]"), FrameEvent::None);
        assert!(decoder.is_pending());

        let frame = decoder.take_frame().unwrap();
        assert_eq!(frame.code(), b'S');
        assert!(frame.payload().is_empty());
        assert!(decoder.take_frame().is_none());
    }

    #[test]
    fn test_take_frame_when_not_pending() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.take_frame().is_none());
        feed_all(&mut decoder, b"[GA");
        assert!(decoder.take_frame().is_none());
        assert_eq!(decoder.state(), ReceiverState::Reading);
    }

    #[test]
    fn test_frame_new_too_large() {
        let big = [0u8; MAX_ARGS + 1];
        assert_eq!(Frame::new(b'E', &big), Err(FrameError::PayloadTooLarge));
        assert!(Frame::new(b'E', &big[..MAX_ARGS]).is_ok());
    }

    #[test]
    fn test_frame_encode() {
        let frame = Frame::new(b'G', &[0x64, 0, 0, 0]).unwrap();
        let mut buf = [0u8; 8];
        let len = frame.encode(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[b'[', b'G', 0x64, 0, 0, 0, b']']);
    }
}
