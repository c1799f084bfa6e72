use std::io;
use std::io::ErrorKind::Other;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("websocket handshake error: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("websocket protocol error: {0}")]
    Frame(#[from] FrameError),
    #[error("the websocket is closed and can be dropped")]
    Closed,
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

/// Failures of the opening handshake. None of them yields a connection.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("missing or empty Sec-WebSocket-Key header")]
    MissingKey,
    #[error("unable to detach the stream from the http layer: {0}")]
    NotHijackable(#[source] io::Error),
    #[error("unable to write the switching protocols response: {0}")]
    Write(#[source] io::Error),
    #[error("unable to split the stream or start the outbound worker: {0}")]
    Transport(#[source] io::Error),
}

/// Violations of the base framing protocol detected while decoding.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("short read: expected {expected} bytes but the stream ended after {read}")]
    ShortRead { expected: usize, read: usize },
    #[error("received unmasked frame from the client")]
    UnmaskedFrame,
    #[error("received masked frame from the server")]
    MaskedFrame,
    #[error("reserved op code: {0:#x}")]
    ReservedOpCode(u8),
    #[error("non zero RSV bits received: {0:#05b}")]
    ReservedBits(u8),
    #[error("payload length {0} exceeds the allowed maximum")]
    LengthOverflow(u64),
    #[error("payload length {0} is not encoded in the shortest form")]
    NonMinimalLength(u64),
    #[error("control frame payload of {0} bytes exceeds 125 bytes")]
    ControlFrameTooLong(usize),
    #[error("control frame without the FIN bit")]
    FragmentedControlFrame,
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::IO(err) => err,
            value => io::Error::new(Other, value),
        }
    }
}
