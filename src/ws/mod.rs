//! Server side websocket protocol engine.
//!
//! ## Examples
//!
//! Upgrade an incoming http request and echo every data frame back.
//! ```no_run
//! use socketeer::http::HttpServer;
//! use socketeer::ws::{self, OpCode};
//!
//! fn serve() -> Result<(), socketeer::ws::Error> {
//!     let server = HttpServer::bind("127.0.0.1:9001")?;
//!     let (request, mut response) = server.accept()?;
//!     let mut ws = ws::upgrade(&request, &mut response)?;
//!     loop {
//!         let frame = ws.read()?;
//!         match frame.op_code {
//!             OpCode::Close => break,
//!             OpCode::Text | OpCode::Binary => ws.write(frame.payload)?,
//!             _ => {}
//!         }
//!     }
//!     ws.close()
//! }
//! ```
//!
//! Share the outbound side with other threads. Frames are written in the order the calls
//! to `write` complete.
//! ```no_run
//! use std::net::TcpStream;
//! use socketeer::ws::Websocket;
//!
//! fn fan_out(ws: &Websocket<TcpStream>) {
//!     for i in 0..4 {
//!         let sender = ws.sender();
//!         std::thread::spawn(move || sender.write_text(&format!("hello from {i}")));
//!     }
//! }
//! ```

use std::io;
use std::io::{BufReader, Chain, Cursor, Read};
use std::str::Utf8Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::stream::Transport;
use crate::ws::decoder::Decoder;
use crate::ws::worker::{Command, Shared, Worker, WorkerConfig, WorkerHandle};

// re-export
pub use crate::ws::config::Config;
pub use crate::ws::error::{Error, FrameError, HandshakeError};
pub use crate::ws::handshake::{compute_accept_key, upgrade, upgrade_with_config, Hijack, Hijacked};
pub use crate::ws::protocol::{DataType, OpCode, Role};

pub mod config;
mod decoder;
mod encoder;
mod error;
mod handshake;
pub mod protocol;
mod worker;

const READ_BUFFER_SIZE: usize = 8 * 1024;
const STOP_RETRY_INTERVAL: Duration = Duration::from_millis(10);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type ReadHalf<S> = BufReader<Chain<Cursor<Vec<u8>>, S>>;

/// Decoded websocket frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    /// Final fragment of a message. Recorded but not acted upon, fragments are not reassembled.
    pub fin: bool,
    pub op_code: OpCode,
    /// Masking key the peer used, if the frame was masked.
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload.
    pub payload: Vec<u8>,
}

impl Frame {
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn as_text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    /// Status code of a close frame, if the peer sent one.
    pub fn close_code(&self) -> Option<u16> {
        match (self.op_code, self.payload.as_slice()) {
            (OpCode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// Connection lifecycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    /// Writes are accepted and flushed by the outbound worker.
    Open,
    /// Close has started, the outbound worker is draining and no new writes are accepted.
    Closing,
    /// The outbound worker has exited, either after `close` or after a write error.
    Closed,
}

/// Cloneable handle to the outbound queue of a [`Websocket`].
#[derive(Debug, Clone)]
pub struct Sender {
    queue: SyncSender<Command>,
    shared: Arc<Shared>,
}

impl Sender {
    /// Enqueue `payload` for the outbound worker. Blocks while the queue is full and fails fast
    /// once the connection is no longer open. Transport errors are not reported here, they
    /// surface through [`Sender::state`].
    pub fn write(&self, payload: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.ensure_open()?;
        self.queue
            .send(Command::Send(payload.into()))
            .map_err(|_| Error::Closed)
    }

    #[inline]
    pub fn write_text(&self, text: &str) -> Result<(), Error> {
        self.write(text)
    }

    #[inline]
    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Checks if the connection stopped accepting writes. This can be the result of `close` or of
    /// an IO error in the outbound worker.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state() != State::Open
    }

    #[inline]
    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

/// Websocket connection that owns the underlying stream.
///
/// Inbound frames are read synchronously by the owner through [`Websocket::read`], which takes
/// `&mut self` so only one reader can exist. Outbound payloads go through a bounded queue to a
/// dedicated worker thread that owns the write half of the stream.
pub struct Websocket<S: Transport> {
    id: u64,
    reader: ReadHalf<S>,
    decoder: Decoder,
    sender: Sender,
    worker: Option<WorkerHandle>,
    config: Config,
    read_closed: bool,
}

impl<S: Transport> Websocket<S> {
    /// Wrap a stream on which the opening handshake has already completed.
    pub fn from_raw_stream(stream: S, role: Role, config: Config) -> Result<Self, Error> {
        Self::new(stream, Vec::new(), role, config)
    }

    pub(crate) fn new(stream: S, read_ahead: Vec<u8>, role: Role, config: Config) -> Result<Self, Error> {
        let writer = stream.try_split()?;
        Ok(Self::from_split(stream, writer, read_ahead, role, config)?)
    }

    /// Build the connection from a read handle and a write handle of the same transport. The
    /// transport is shut down if the outbound worker cannot be started.
    pub(crate) fn from_split(
        stream: S,
        writer: S,
        read_ahead: Vec<u8>,
        role: Role,
        config: Config,
    ) -> io::Result<Self> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (queue_tx, queue_rx) = worker::queue(config.queue_capacity());
        let shared = Shared::new();
        let worker = Worker::start_on_thread(
            writer,
            queue_rx,
            shared.clone(),
            WorkerConfig {
                id,
                op_code: config.data_type().into(),
                role,
                close_frame: config.close_frame(),
            },
        )
        .inspect_err(|_| {
            let _ = stream.shutdown();
        })?;
        debug!("websocket [{id}] opened as {role:?}");
        Ok(Self {
            id,
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, Cursor::new(read_ahead).chain(stream)),
            decoder: Decoder::new(role, config.max_payload_len()),
            sender: Sender { queue: queue_tx, shared },
            worker: Some(worker),
            config,
            read_closed: false,
        })
    }

    /// Block until the next frame arrives. Close frames are returned like any other frame and
    /// leave the connection open, call [`Websocket::close`] to finish the closing handshake.
    /// After an error the read side is unusable and every further call returns
    /// [`Error::Closed`].
    pub fn read(&mut self) -> Result<Frame, Error> {
        if self.read_closed {
            return Err(Error::Closed);
        }
        match self.decoder.decode_next(&mut self.reader) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                debug!("websocket [{}] read failed: {err}", self.id);
                self.read_closed = true;
                Err(err)
            }
        }
    }

    #[inline]
    pub fn write(&self, payload: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.sender.write(payload)
    }

    #[inline]
    pub fn write_text(&self, text: &str) -> Result<(), Error> {
        self.sender.write_text(text)
    }

    /// Handle that can enqueue writes from other threads.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    #[inline]
    pub fn state(&self) -> State {
        self.sender.state()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the outbound worker, wait for it to exit and shut the transport down.
    ///
    /// Payloads enqueued before the call are still flushed, followed by a close frame unless
    /// disabled in [`Config`]. If the worker cannot finish within the configured close timeout,
    /// typically because the peer stopped reading, the transport is shut down underneath it and
    /// whatever is still queued is dropped. Calling it more than once is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let id = self.id;
        let deadline = Instant::now() + self.config.close_timeout();
        self.read_closed = true;

        if self.sender.shared.begin_close() {
            self.send_stop(&worker, deadline);
        }

        let transport = self.reader.get_ref().get_ref().1;
        if !worker.wait(deadline.saturating_duration_since(Instant::now())) {
            warn!(
                "websocket [{id}] outbound worker still busy after {:?}, shutting down transport",
                self.config.close_timeout()
            );
            let _ = transport.shutdown();
        }
        worker.join(id);
        self.sender.shared.mark_closed();
        transport.shutdown()?;
        debug!("websocket [{id}] closed");
        Ok(())
    }

    /// Queue the stop command behind any pending payloads, retrying while the queue is full.
    fn send_stop(&self, worker: &WorkerHandle, deadline: Instant) {
        loop {
            match self.sender.queue.try_send(Command::Stop) {
                Err(TrySendError::Full(_)) => {
                    if worker.wait(STOP_RETRY_INTERVAL) || Instant::now() >= deadline {
                        return;
                    }
                }
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

impl<S: Transport> Drop for Websocket<S> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!("websocket [{}] error on drop: {err}", self.id);
        }
    }
}
