use std::io::Read;

use log::trace;

use crate::util::{apply_mask, read_full};
use crate::ws::protocol::{self, OpCode, Role};
use crate::ws::{Error, Frame, FrameError};

/// Blocking frame decoder. Every call to [`Decoder::decode_next`] consumes exactly one frame,
/// header, mask key and payload included, so the stream stays aligned on frame boundaries.
#[derive(Debug)]
pub struct Decoder {
    role: Role,
    max_payload_len: usize,
}

impl Decoder {
    pub fn new(role: Role, max_payload_len: usize) -> Self {
        Self { role, max_payload_len }
    }

    pub fn decode_next<S: Read>(&self, stream: &mut S) -> Result<Frame, Error> {
        let mut header = [0u8; 2];
        read_full(stream, &mut header)?;

        let b = header[0];
        let fin = b & protocol::FIN_MASK != 0;
        let rsv = b & protocol::RSV_MASK;
        if rsv != 0 {
            return Err(FrameError::ReservedBits(rsv >> 4).into());
        }
        let op_code = OpCode::try_from(b & protocol::OP_CODE_MASK)?;

        let b = header[1];
        let masked = b & protocol::MASK_MASK != 0;
        match (masked, self.role.expects_masked_input()) {
            (false, true) => return Err(FrameError::UnmaskedFrame.into()),
            (true, false) => return Err(FrameError::MaskedFrame.into()),
            _ => {}
        }

        let payload_length = match b & protocol::PAYLOAD_LENGTH_MASK {
            protocol::EXTENDED_PAYLOAD_LENGTH_16 => {
                let mut bytes = [0u8; 2];
                read_full(stream, &mut bytes)?;
                let len = u16::from_be_bytes(bytes) as u64;
                if len <= protocol::MAX_SHORT_PAYLOAD_LENGTH as u64 {
                    return Err(FrameError::NonMinimalLength(len).into());
                }
                len
            }
            protocol::EXTENDED_PAYLOAD_LENGTH_64 => {
                let mut bytes = [0u8; 8];
                read_full(stream, &mut bytes)?;
                let len = u64::from_be_bytes(bytes);
                if len <= u16::MAX as u64 {
                    return Err(FrameError::NonMinimalLength(len).into());
                }
                len
            }
            short => short as u64,
        };
        let payload_length = self.check_payload_length(payload_length)?;

        if op_code.is_control() {
            if payload_length > protocol::MAX_SHORT_PAYLOAD_LENGTH {
                return Err(FrameError::ControlFrameTooLong(payload_length).into());
            }
            if !fin {
                return Err(FrameError::FragmentedControlFrame.into());
            }
        }

        let mask = if masked {
            let mut key = [0u8; 4];
            read_full(stream, &mut key)?;
            Some(key)
        } else {
            None
        };

        let mut payload = vec![0u8; payload_length];
        read_full(stream, &mut payload)?;
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        trace!("decoded {op_code:?} frame (fin: {fin}, len: {payload_length})");
        Ok(Frame {
            fin,
            op_code,
            mask,
            payload,
        })
    }

    #[inline]
    fn check_payload_length(&self, payload_length: u64) -> Result<usize, FrameError> {
        // the most significant bit of the 64 bit form must be zero
        if payload_length >> 63 != 0 {
            return Err(FrameError::LengthOverflow(payload_length));
        }
        match usize::try_from(payload_length) {
            Ok(len) if len <= self.max_payload_len => Ok(len),
            _ => Err(FrameError::LengthOverflow(payload_length)),
        }
    }
}
