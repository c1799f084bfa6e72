use std::io;
use std::io::Write;

use log::trace;

use crate::util::apply_mask;
use crate::ws::protocol::{self, OpCode};

/// FIN + opcode, length marker, up to 8 length bytes and the mask key.
const MAX_HEADER_LEN: usize = 14;

/// Write `body` as a single final frame and flush the stream. The payload is masked only when
/// `mask` is provided, which is the case for the client role.
pub(crate) fn send<S: Write>(stream: &mut S, op_code: OpCode, mask: Option<[u8; 4]>, body: &[u8]) -> io::Result<()> {
    let mut header = [0u8; MAX_HEADER_LEN];
    header[0] = protocol::FIN_MASK | op_code.as_u8();
    let mask_bit = if mask.is_some() { protocol::MASK_MASK } else { 0 };

    let len = body.len();
    let mut header_len = if len <= protocol::MAX_SHORT_PAYLOAD_LENGTH {
        header[1] = mask_bit | len as u8;
        2
    } else if len <= u16::MAX as usize {
        header[1] = mask_bit | protocol::EXTENDED_PAYLOAD_LENGTH_16;
        header[2..4].copy_from_slice(&(len as u16).to_be_bytes());
        4
    } else {
        header[1] = mask_bit | protocol::EXTENDED_PAYLOAD_LENGTH_64;
        header[2..10].copy_from_slice(&(len as u64).to_be_bytes());
        10
    };

    if let Some(key) = mask {
        header[header_len..header_len + 4].copy_from_slice(&key);
        header_len += 4;
    }

    stream.write_all(&header[..header_len])?;
    match mask {
        Some(key) => {
            let mut masked = body.to_vec();
            apply_mask(&mut masked, key);
            stream.write_all(&masked)?;
        }
        None => stream.write_all(body)?,
    }
    stream.flush()?;
    trace!("sent {op_code:?} frame (len: {len})");
    Ok(())
}

/// Close frame payload: big endian status code followed by the UTF-8 reason, cut on a char
/// boundary so that the whole payload fits in a control frame.
pub(crate) fn close_payload(status: u16, reason: &str) -> Vec<u8> {
    let mut end = reason.len().min(protocol::MAX_SHORT_PAYLOAD_LENGTH - 2);
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    let mut payload = Vec::with_capacity(2 + end);
    payload.extend_from_slice(&status.to_be_bytes());
    payload.extend_from_slice(&reason.as_bytes()[..end]);
    payload
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::ws::decoder::Decoder;
    use crate::ws::protocol::Role;

    fn encode(op_code: OpCode, mask: Option<[u8; 4]>, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        send(&mut out, op_code, mask, body).unwrap();
        out
    }

    #[test]
    fn should_use_short_length_up_to_125() {
        let out = encode(OpCode::Text, None, &[b'a'; 125]);
        assert_eq!(0x81, out[0]);
        assert_eq!(125, out[1]);
        assert_eq!(2 + 125, out.len());
    }

    #[test]
    fn should_use_16_bit_length_from_126() {
        let out = encode(OpCode::Binary, None, &[0u8; 126]);
        assert_eq!(0x82, out[0]);
        assert_eq!(126, out[1]);
        assert_eq!([0x00u8, 126], out[2..4]);
        assert_eq!(4 + 126, out.len());

        let out = encode(OpCode::Binary, None, &vec![0u8; 65535]);
        assert_eq!(126, out[1]);
        assert_eq!([0xffu8, 0xff], out[2..4]);
    }

    #[test]
    fn should_use_full_64_bit_length_above_65535() {
        let out = encode(OpCode::Binary, None, &vec![0u8; 65536]);
        assert_eq!(127, out[1]);
        assert_eq!(65536u64.to_be_bytes(), out[2..10]);
        assert_eq!(10 + 65536, out.len());
    }

    #[test]
    fn should_not_truncate_lengths_above_24_bits() {
        let len = (1usize << 24) + 3;
        let out = encode(OpCode::Binary, None, &vec![7u8; len]);
        assert_eq!([0u8, 0, 0, 0, 0x01, 0x00, 0x00, 0x03], out[2..10]);
    }

    #[test]
    fn should_never_mask_in_server_role() {
        let out = encode(OpCode::Text, None, b"plain");
        assert_eq!(0, out[1] & protocol::MASK_MASK);
        assert_eq!(b"plain", &out[2..]);
    }

    #[test]
    fn should_mask_payload_when_key_given() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let out = encode(OpCode::Text, Some(mask), b"Hello");
        assert_eq!([0x81u8, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58], out.as_slice());
    }

    #[test]
    fn should_round_trip_through_decoder() {
        let mask = [0x01, 0x80, 0x7f, 0xff];
        for len in [0usize, 1, 125, 126, 65535, 65536, 10_000_000] {
            let payload = (0..len).map(|i| (i % 253) as u8).collect::<Vec<_>>();
            let out = encode(OpCode::Binary, Some(mask), &payload);
            let frame = Decoder::new(Role::Server, 16 * 1024 * 1024)
                .decode_next(&mut Cursor::new(out))
                .unwrap();
            assert_eq!(OpCode::Binary, frame.op_code);
            assert!(frame.fin);
            assert_eq!(Some(mask), frame.mask);
            assert!(payload == frame.payload, "payload mismatch for len {len}");
        }
    }

    #[test]
    fn should_build_close_payload() {
        assert_eq!(vec![0x03, 0xe8, b'o', b'k'], close_payload(1000, "ok"));
        assert_eq!(125, close_payload(1001, &"x".repeat(200)).len());
        // 'é' takes two bytes, only 61 of them fit in the 123 bytes left for the reason
        assert_eq!(124, close_payload(1001, &"é".repeat(100)).len());
    }
}
