//! Message vocabulary for the host link
//!
//! Every code is a single ASCII byte so the protocol can be driven by hand
//! from a serial terminal:
//! - Host → controller: commands (`G`, `S`, `H`, ...) and query sub-codes
//! - Controller → host: replies (`A`, `D`, `F`, `E`) and fault sub-codes

use heapless::Vec;

use crate::frame::{Frame, MAX_ARGS};

// Command codes: Host → controller
pub const CMD_GOTO: u8 = b'G';
pub const CMD_STOP: u8 = b'S';
pub const CMD_HOME: u8 = b'H';
pub const CMD_RESET: u8 = b'R';
pub const CMD_QUERY: u8 = b'Q';
pub const CMD_UPDATE_PARAMETERS: u8 = b'P';
pub const CMD_ECHO: u8 = b'E';
pub const CMD_ENABLE: u8 = b'Y';
pub const CMD_DISABLE: u8 = b'X';
pub const CMD_RESET_POSITION: u8 = b'Z';

// Query sub-codes
pub const QUERY_MODEL_NO: u8 = b'M';
pub const QUERY_SERIAL_NO: u8 = b'S';
pub const QUERY_FIRMWARE: u8 = b'W';
pub const QUERY_PARAMETERS: u8 = b'P';
pub const QUERY_FAULTS: u8 = b'F';
pub const QUERY_POSITION: u8 = b'X';
pub const QUERY_MODE: u8 = b'T';
pub const QUERY_FAULT_REGS: u8 = b'R';

// Reply codes: Controller → host
pub const REPLY_ACK: u8 = b'A';
pub const REPLY_DONE: u8 = b'D';
pub const REPLY_FAULT: u8 = b'F';
pub const REPLY_ECHO: u8 = b'E';

// Fault sub-codes
pub const FAULT_NACK: u8 = b'N';
pub const FAULT_DRIVER: u8 = b'D';
pub const FAULT_INVALID_PARAMETERS: u8 = b'P';
pub const FAULT_DRIVER_SYNC: u8 = b'Y';
pub const FAULT_LIMIT1: u8 = b'L';
pub const FAULT_LIMIT2: u8 = b'K';
pub const FAULT_HOME: u8 = b'H';

/// Size of the settings record carried by UPDATE_PARAMETERS and QUERY(P)
pub const SETTINGS_LEN: usize = 12;

/// Commands accepted while the controller is faulted
pub const FAULT_ALLOWED: [Command; 3] = [Command::Reset, Command::Query, Command::Echo];

/// Command codes understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Move to an absolute step position
    Goto,
    /// Decelerate to a controlled stop
    Stop,
    /// Run the homing sequence
    Home,
    /// Clear latched faults
    Reset,
    /// Read-only status query
    Query,
    /// Replace the settings record
    UpdateParameters,
    /// Return the payload unchanged
    Echo,
    /// Energize the driver outputs
    Enable,
    /// De-energize the driver outputs
    Disable,
    /// Zero the position reference
    ResetPosition,
}

/// Expected argument length for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArgLen {
    /// Exactly this many bytes
    Exact(usize),
    /// Anything up to the frame capacity
    Any,
}

impl ArgLen {
    /// Check a received argument length
    pub fn accepts(self, len: usize) -> bool {
        match self {
            ArgLen::Exact(n) => len == n,
            ArgLen::Any => len <= MAX_ARGS,
        }
    }
}

impl Command {
    /// Parse a command from its wire code
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CMD_GOTO => Some(Command::Goto),
            CMD_STOP => Some(Command::Stop),
            CMD_HOME => Some(Command::Home),
            CMD_RESET => Some(Command::Reset),
            CMD_QUERY => Some(Command::Query),
            CMD_UPDATE_PARAMETERS => Some(Command::UpdateParameters),
            CMD_ECHO => Some(Command::Echo),
            CMD_ENABLE => Some(Command::Enable),
            CMD_DISABLE => Some(Command::Disable),
            CMD_RESET_POSITION => Some(Command::ResetPosition),
            _ => None,
        }
    }

    /// Convert to wire code
    pub fn to_byte(self) -> u8 {
        match self {
            Command::Goto => CMD_GOTO,
            Command::Stop => CMD_STOP,
            Command::Home => CMD_HOME,
            Command::Reset => CMD_RESET,
            Command::Query => CMD_QUERY,
            Command::UpdateParameters => CMD_UPDATE_PARAMETERS,
            Command::Echo => CMD_ECHO,
            Command::Enable => CMD_ENABLE,
            Command::Disable => CMD_DISABLE,
            Command::ResetPosition => CMD_RESET_POSITION,
        }
    }

    /// Returns true if the command may run while faulted
    pub fn allowed_while_faulted(self) -> bool {
        FAULT_ALLOWED.contains(&self)
    }

    /// Argument length this command requires
    pub fn arg_len(self) -> ArgLen {
        match self {
            Command::Goto => ArgLen::Exact(4),
            Command::Home => ArgLen::Exact(1),
            Command::Query => ArgLen::Exact(1),
            Command::UpdateParameters => ArgLen::Exact(SETTINGS_LEN),
            Command::Echo => ArgLen::Any,
            Command::Stop
            | Command::Reset
            | Command::Enable
            | Command::Disable
            | Command::ResetPosition => ArgLen::Exact(0),
        }
    }
}

/// Query sub-codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueryKind {
    ModelNo,
    SerialNo,
    Firmware,
    Parameters,
    Faults,
    Position,
    Mode,
    FaultRegs,
}

impl QueryKind {
    /// Parse a query sub-code
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            QUERY_MODEL_NO => Some(QueryKind::ModelNo),
            QUERY_SERIAL_NO => Some(QueryKind::SerialNo),
            QUERY_FIRMWARE => Some(QueryKind::Firmware),
            QUERY_PARAMETERS => Some(QueryKind::Parameters),
            QUERY_FAULTS => Some(QueryKind::Faults),
            QUERY_POSITION => Some(QueryKind::Position),
            QUERY_MODE => Some(QueryKind::Mode),
            QUERY_FAULT_REGS => Some(QueryKind::FaultRegs),
            _ => None,
        }
    }

    /// Convert to wire sub-code
    pub fn to_byte(self) -> u8 {
        match self {
            QueryKind::ModelNo => QUERY_MODEL_NO,
            QueryKind::SerialNo => QUERY_SERIAL_NO,
            QueryKind::Firmware => QUERY_FIRMWARE,
            QueryKind::Parameters => QUERY_PARAMETERS,
            QueryKind::Faults => QUERY_FAULTS,
            QueryKind::Position => QUERY_POSITION,
            QueryKind::Mode => QUERY_MODE,
            QueryKind::FaultRegs => QUERY_FAULT_REGS,
        }
    }
}

/// Reply codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyCode {
    /// Command accepted (data replies also use this code)
    Ack,
    /// Motion finished
    Done,
    /// Command rejected or hardware fault
    Fault,
    /// Echo of the command payload
    Echo,
}

impl ReplyCode {
    /// Parse a reply code
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            REPLY_ACK => Some(ReplyCode::Ack),
            REPLY_DONE => Some(ReplyCode::Done),
            REPLY_FAULT => Some(ReplyCode::Fault),
            REPLY_ECHO => Some(ReplyCode::Echo),
            _ => None,
        }
    }

    /// Convert to wire code
    pub fn to_byte(self) -> u8 {
        match self {
            ReplyCode::Ack => REPLY_ACK,
            ReplyCode::Done => REPLY_DONE,
            ReplyCode::Fault => REPLY_FAULT,
            ReplyCode::Echo => REPLY_ECHO,
        }
    }
}

/// Fault sub-codes carried in the first byte of a FAULT reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultCode {
    /// Command not accepted
    Nack,
    /// Driver chip reported a fault
    Driver,
    /// Malformed or out-of-range arguments
    InvalidParameters,
    /// Driver registers did not match the written settings
    DriverSync,
    /// Limit switch 1 tripped
    Limit1,
    /// Limit switch 2 tripped
    Limit2,
    /// Homing failed
    Home,
}

impl FaultCode {
    /// Parse a fault sub-code
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FAULT_NACK => Some(FaultCode::Nack),
            FAULT_DRIVER => Some(FaultCode::Driver),
            FAULT_INVALID_PARAMETERS => Some(FaultCode::InvalidParameters),
            FAULT_DRIVER_SYNC => Some(FaultCode::DriverSync),
            FAULT_LIMIT1 => Some(FaultCode::Limit1),
            FAULT_LIMIT2 => Some(FaultCode::Limit2),
            FAULT_HOME => Some(FaultCode::Home),
            _ => None,
        }
    }

    /// Convert to wire sub-code
    pub fn to_byte(self) -> u8 {
        match self {
            FaultCode::Nack => FAULT_NACK,
            FaultCode::Driver => FAULT_DRIVER,
            FaultCode::InvalidParameters => FAULT_INVALID_PARAMETERS,
            FaultCode::DriverSync => FAULT_DRIVER_SYNC,
            FaultCode::Limit1 => FAULT_LIMIT1,
            FaultCode::Limit2 => FAULT_LIMIT2,
            FaultCode::Home => FAULT_HOME,
        }
    }
}

/// Device mode reported by QUERY(T)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DeviceMode {
    Idle = 0,
    Sleep = 1,
    Moving = 2,
    Homing = 3,
    Fault = 4,
}

impl DeviceMode {
    /// Wire value
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Command-level errors reported back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Code is not a known command
    UnknownCommand,
    /// Arguments have the wrong length or an unknown sub-code
    MalformedPayload,
    /// Command is not legal in the current controller state
    IllegalInState,
}

impl ProtocolError {
    /// Fault sub-code sent to the host
    pub fn fault_code(self) -> FaultCode {
        match self {
            ProtocolError::UnknownCommand | ProtocolError::IllegalInState => FaultCode::Nack,
            ProtocolError::MalformedPayload => FaultCode::InvalidParameters,
        }
    }
}

/// A command with its arguments decoded
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    Goto { target: i32 },
    Stop,
    /// `toward_positive` is the direction byte being non-zero
    Home { toward_positive: bool },
    Reset,
    Query(QueryKind),
    UpdateParameters([u8; SETTINGS_LEN]),
    Echo(Vec<u8, MAX_ARGS>),
    Enable,
    Disable,
    ResetPosition,
}

impl Request {
    /// Decode the arguments of an already-recognized command
    pub fn decode(command: Command, args: &[u8]) -> Result<Self, ProtocolError> {
        if !command.arg_len().accepts(args.len()) {
            return Err(ProtocolError::MalformedPayload);
        }

        let request = match command {
            Command::Goto => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(args);
                Request::Goto {
                    target: i32::from_le_bytes(bytes),
                }
            }
            Command::Stop => Request::Stop,
            Command::Home => Request::Home {
                toward_positive: args[0] != 0,
            },
            Command::Reset => Request::Reset,
            Command::Query => {
                let kind = QueryKind::from_byte(args[0]).ok_or(ProtocolError::MalformedPayload)?;
                Request::Query(kind)
            }
            Command::UpdateParameters => {
                let mut bytes = [0u8; SETTINGS_LEN];
                bytes.copy_from_slice(args);
                Request::UpdateParameters(bytes)
            }
            Command::Echo => {
                Request::Echo(Vec::from_slice(args).map_err(|_| ProtocolError::MalformedPayload)?)
            }
            Command::Enable => Request::Enable,
            Command::Disable => Request::Disable,
            Command::ResetPosition => Request::ResetPosition,
        };
        Ok(request)
    }

    /// Decode a whole frame, including the command code
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let command = Command::from_byte(frame.code()).ok_or(ProtocolError::UnknownCommand)?;
        Self::decode(command, frame.payload())
    }

    /// Command this request was decoded from
    pub fn command(&self) -> Command {
        match self {
            Request::Goto { .. } => Command::Goto,
            Request::Stop => Command::Stop,
            Request::Home { .. } => Command::Home,
            Request::Reset => Command::Reset,
            Request::Query(_) => Command::Query,
            Request::UpdateParameters(_) => Command::UpdateParameters,
            Request::Echo(_) => Command::Echo,
            Request::Enable => Command::Enable,
            Request::Disable => Command::Disable,
            Request::ResetPosition => Command::ResetPosition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        let commands = [
            Command::Goto,
            Command::Stop,
            Command::Home,
            Command::Reset,
            Command::Query,
            Command::UpdateParameters,
            Command::Echo,
            Command::Enable,
            Command::Disable,
            Command::ResetPosition,
        ];

        for cmd in commands {
            assert_eq!(Command::from_byte(cmd.to_byte()), Some(cmd));
        }
        assert_eq!(Command::from_byte(b'?'), None);
        assert_eq!(Command::from_byte(b'A'), None);
    }

    #[test]
    fn test_fault_allow_list() {
        assert!(Command::Reset.allowed_while_faulted());
        assert!(Command::Query.allowed_while_faulted());
        assert!(Command::Echo.allowed_while_faulted());
        assert!(!Command::Goto.allowed_while_faulted());
        assert!(!Command::Home.allowed_while_faulted());
        assert!(!Command::Enable.allowed_while_faulted());
        assert!(!Command::Disable.allowed_while_faulted());
    }

    #[test]
    fn test_decode_goto_little_endian() {
        let frame = Frame::new(CMD_GOTO, &[0x64, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(
            Request::from_frame(&frame),
            Ok(Request::Goto { target: 100 })
        );

        let frame = Frame::new(CMD_GOTO, &(-830i32).to_le_bytes()).unwrap();
        assert_eq!(
            Request::from_frame(&frame),
            Ok(Request::Goto { target: -830 })
        );
    }

    #[test]
    fn test_decode_wrong_length() {
        let short_goto = Frame::new(CMD_GOTO, &[1, 2, 3]).unwrap();
        assert_eq!(
            Request::from_frame(&short_goto),
            Err(ProtocolError::MalformedPayload)
        );

        let stop_with_args = Frame::new(CMD_STOP, &[0]).unwrap();
        assert_eq!(
            Request::from_frame(&stop_with_args),
            Err(ProtocolError::MalformedPayload)
        );

        let bare_query = Frame::empty(CMD_QUERY);
        assert_eq!(
            Request::from_frame(&bare_query),
            Err(ProtocolError::MalformedPayload)
        );
    }

    #[test]
    fn test_decode_unknown_query() {
        let frame = Frame::new(CMD_QUERY, b"?").unwrap();
        assert_eq!(
            Request::from_frame(&frame),
            Err(ProtocolError::MalformedPayload)
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let frame = Frame::empty(b'?');
        assert_eq!(
            Request::from_frame(&frame),
            Err(ProtocolError::UnknownCommand)
        );
    }

    #[test]
    fn test_decode_echo_and_home() {
        let frame = Frame::new(CMD_ECHO, b"hello").unwrap();
        match Request::from_frame(&frame).unwrap() {
            Request::Echo(payload) => assert_eq!(payload.as_slice(), b"hello"),
            other => panic!("unexpected {:?}", other),
        }

        let frame = Frame::new(CMD_HOME, &[0]).unwrap();
        assert_eq!(
            Request::from_frame(&frame),
            Ok(Request::Home {
                toward_positive: false
            })
        );
    }

    #[test]
    fn test_protocol_error_fault_codes() {
        assert_eq!(ProtocolError::UnknownCommand.fault_code(), FaultCode::Nack);
        assert_eq!(ProtocolError::IllegalInState.fault_code(), FaultCode::Nack);
        assert_eq!(
            ProtocolError::MalformedPayload.fault_code(),
            FaultCode::InvalidParameters
        );
    }

    #[test]
    fn test_reply_and_fault_codes() {
        for code in [
            FaultCode::Nack,
            FaultCode::Driver,
            FaultCode::InvalidParameters,
            FaultCode::DriverSync,
            FaultCode::Limit1,
            FaultCode::Limit2,
            FaultCode::Home,
        ] {
            assert_eq!(FaultCode::from_byte(code.to_byte()), Some(code));
        }
        assert_eq!(ReplyCode::from_byte(b'D'), Some(ReplyCode::Done));
        assert_eq!(DeviceMode::Fault.to_byte(), 4);
    }
}
