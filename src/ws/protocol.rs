use crate::ws::FrameError;

pub const FIN_MASK: u8 = 0b1000_0000;
pub const RSV_MASK: u8 = 0b0111_0000;
pub const OP_CODE_MASK: u8 = 0b0000_1111;
pub const MASK_MASK: u8 = 0b1000_0000;
pub const PAYLOAD_LENGTH_MASK: u8 = 0b0111_1111;

/// Largest payload that fits in the 7-bit length field.
pub const MAX_SHORT_PAYLOAD_LENGTH: usize = 125;
pub const EXTENDED_PAYLOAD_LENGTH_16: u8 = 126;
pub const EXTENDED_PAYLOAD_LENGTH_64: u8 = 127;

/// Close status sent when the connection is closed normally.
pub const NORMAL_CLOSURE: u16 = 1000;

pub mod op {
    pub const CONTINUATION_FRAME: u8 = 0x0;
    pub const TEXT_FRAME: u8 = 0x1;
    pub const BINARY_FRAME: u8 = 0x2;
    pub const CONNECTION_CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;
}

/// Frame operation carried in the low nibble of the first header byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => op::CONTINUATION_FRAME,
            OpCode::Text => op::TEXT_FRAME,
            OpCode::Binary => op::BINARY_FRAME,
            OpCode::Close => op::CONNECTION_CLOSE,
            OpCode::Ping => op::PING,
            OpCode::Pong => op::PONG,
        }
    }

    /// Control frames may not be fragmented and carry at most 125 bytes.
    #[inline]
    pub const fn is_control(self) -> bool {
        match self {
            OpCode::Close | OpCode::Ping | OpCode::Pong => true,
            OpCode::Continuation | OpCode::Text | OpCode::Binary => false,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            op::CONTINUATION_FRAME => Ok(OpCode::Continuation),
            op::TEXT_FRAME => Ok(OpCode::Text),
            op::BINARY_FRAME => Ok(OpCode::Binary),
            op::CONNECTION_CLOSE => Ok(OpCode::Close),
            op::PING => Ok(OpCode::Ping),
            op::PONG => Ok(OpCode::Pong),
            reserved => Err(FrameError::ReservedOpCode(reserved)),
        }
    }
}

/// Payload classification of outbound data frames. Fixed per connection.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum DataType {
    Continuation,
    #[default]
    Utf8,
    Binary,
}

impl From<DataType> for OpCode {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Continuation => OpCode::Continuation,
            DataType::Utf8 => OpCode::Text,
            DataType::Binary => OpCode::Binary,
        }
    }
}

/// Which end of the connection we are. Decides the masking rules in both directions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// Frames we receive must carry a mask when we are the server.
    #[inline]
    pub const fn expects_masked_input(self) -> bool {
        matches!(self, Role::Server)
    }

    /// Frames we send must carry a mask when we are the client.
    #[inline]
    pub const fn masks_output(self) -> bool {
        matches!(self, Role::Client)
    }
}
