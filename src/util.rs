use std::io::ErrorKind::Interrupted;
use std::io::Read;

use crate::ws::{Error, FrameError};

/// XOR `payload` in place with the 4 byte masking key. Applying it twice restores the input.
#[inline]
pub fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, b) in payload.iter_mut().enumerate() {
        *b ^= mask[i & 3];
    }
}

/// Fill `buf` completely from the stream. A stream that ends early is reported as
/// [`FrameError::ShortRead`] together with the number of bytes that did arrive.
pub fn read_full<S: Read>(stream: &mut S, buf: &mut [u8]) -> Result<(), Error> {
    let expected = buf.len();
    let mut read = 0;
    while read < expected {
        match stream.read(&mut buf[read..]) {
            Ok(0) => return Err(FrameError::ShortRead { expected, read }.into()),
            Ok(n) => read += n,
            Err(err) if err.kind() == Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
