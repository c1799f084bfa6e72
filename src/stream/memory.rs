//! In-memory duplex stream, handy for tests and for driving the protocol without sockets.
//!
//! ```
//! use std::io::{Read, Write};
//! use socketeer::stream::memory;
//!
//! let (mut a, mut b) = memory::pair();
//! a.write_all(b"hello").unwrap();
//! let mut buf = [0u8; 5];
//! b.read_exact(&mut buf).unwrap();
//! assert_eq!(b"hello", &buf);
//! ```

use std::collections::VecDeque;
use std::io;
use std::io::ErrorKind::BrokenPipe;
use std::io::{Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::stream::Transport;

/// Default number of bytes a direction buffers before writes block.
pub const DEFAULT_PIPE_CAPACITY: usize = 1024 * 1024;

#[derive(Debug)]
struct Pipe {
    state: Mutex<PipeState>,
    cond: Condvar,
}

#[derive(Debug)]
struct PipeState {
    buf: VecDeque<u8>,
    capacity: usize,
    closed: bool,
}

impl Pipe {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState {
                buf: VecDeque::new(),
                capacity: capacity.max(1),
                closed: false,
            }),
            cond: Condvar::new(),
        })
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, PipeState>> {
        self.state.lock().map_err(|_| io::Error::other("pipe lock poisoned"))
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, PipeState>) -> io::Result<MutexGuard<'a, PipeState>> {
        self.cond.wait(guard).map_err(|_| io::Error::other("pipe lock poisoned"))
    }

    fn close(&self) -> io::Result<()> {
        self.lock()?.closed = true;
        self.cond.notify_all();
        Ok(())
    }
}

/// One end of an in-memory connection. Writes block while the peer's buffer is full, which makes
/// it possible to model a slow consumer.
#[derive(Debug)]
pub struct MemoryStream {
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
}

/// Create two connected ends with the default buffer capacity.
pub fn pair() -> (MemoryStream, MemoryStream) {
    pair_with_capacity(DEFAULT_PIPE_CAPACITY)
}

/// Create two connected ends, each direction buffering at most `capacity` bytes.
pub fn pair_with_capacity(capacity: usize) -> (MemoryStream, MemoryStream) {
    let a_to_b = Pipe::new(capacity);
    let b_to_a = Pipe::new(capacity);
    let a = MemoryStream {
        inbound: b_to_a.clone(),
        outbound: a_to_b.clone(),
    };
    let b = MemoryStream {
        inbound: a_to_b,
        outbound: b_to_a,
    };
    (a, b)
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.inbound.lock()?;
        while state.buf.is_empty() && !state.closed {
            state = self.inbound.wait(state)?;
        }
        let n = buf.len().min(state.buf.len());
        for (dst, src) in buf.iter_mut().zip(state.buf.drain(..n)) {
            *dst = src;
        }
        drop(state);
        self.inbound.cond.notify_all();
        Ok(n)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.outbound.lock()?;
        while !state.closed && state.buf.len() >= state.capacity {
            state = self.outbound.wait(state)?;
        }
        if state.closed {
            return Err(io::Error::new(BrokenPipe, "memory stream is shut down"));
        }
        let n = buf.len().min(state.capacity - state.buf.len());
        state.buf.extend(&buf[..n]);
        drop(state);
        self.outbound.cond.notify_all();
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MemoryStream {
    fn try_split(&self) -> io::Result<Self> {
        Ok(Self {
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
        })
    }

    fn shutdown(&self) -> io::Result<()> {
        self.inbound.close()?;
        self.outbound.close()
    }
}
