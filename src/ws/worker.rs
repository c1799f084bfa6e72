use std::io;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, warn};

use crate::ws::encoder;
use crate::ws::protocol::{self, OpCode, Role};
use crate::ws::State;

/// Frames up to this size are coalesced with their header into a single write.
const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// Messages accepted by the outbound worker.
#[derive(Debug)]
pub(crate) enum Command {
    Send(Vec<u8>),
    Stop,
}

/// Connection state shared by the websocket, its senders and the worker.
#[derive(Debug)]
pub(crate) struct Shared {
    state: AtomicU8,
}

impl Shared {
    const OPEN: u8 = 0;
    const CLOSING: u8 = 1;
    const CLOSED: u8 = 2;

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(Self::OPEN),
        })
    }

    #[inline]
    pub fn state(&self) -> State {
        match self.state.load(Ordering::Acquire) {
            Self::OPEN => State::Open,
            Self::CLOSING => State::Closing,
            _ => State::Closed,
        }
    }

    /// Move from `Open` to `Closing`. Returns false if the connection was not open.
    pub fn begin_close(&self) -> bool {
        self.state
            .compare_exchange(Self::OPEN, Self::CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn mark_closed(&self) {
        self.state.store(Self::CLOSED, Ordering::Release);
    }
}

/// Settings the worker needs from the connection config.
#[derive(Debug, Copy, Clone)]
pub(crate) struct WorkerConfig {
    pub id: u64,
    pub op_code: OpCode,
    pub role: Role,
    pub close_frame: bool,
}

/// Owns the write half of the transport. Every outbound byte goes through here, in queue order.
pub(crate) struct Worker<S: Write> {
    writer: BufWriter<S>,
    queue: Receiver<Command>,
    shared: Arc<Shared>,
    config: WorkerConfig,
}

enum Exit {
    Stopped,
    Disconnected,
    Failed(io::Error),
}

impl<S: Write + Send + 'static> Worker<S> {
    pub fn start_on_thread(
        writer: S,
        queue: Receiver<Command>,
        shared: Arc<Shared>,
        config: WorkerConfig,
    ) -> io::Result<WorkerHandle> {
        let (done_tx, done_rx) = std::sync::mpsc::sync_channel(1);
        let worker = Self {
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, writer),
            queue,
            shared,
            config,
        };
        let handle = std::thread::Builder::new()
            .name(format!("ws-writer-{}", config.id))
            .spawn(move || {
                worker.run();
                let _ = done_tx.send(());
            })?;
        Ok(WorkerHandle { handle, done: done_rx })
    }

    fn run(mut self) {
        let exit = loop {
            match self.queue.recv() {
                Ok(Command::Send(payload)) => {
                    if let Err(err) = self.send(self.config.op_code, &payload) {
                        break Exit::Failed(err);
                    }
                }
                Ok(Command::Stop) => break Exit::Stopped,
                Err(_) => break Exit::Disconnected,
            }
        };

        let id = self.config.id;
        match exit {
            Exit::Stopped => {
                if self.config.close_frame {
                    let payload = encoder::close_payload(protocol::NORMAL_CLOSURE, "");
                    if let Err(err) = self.send(OpCode::Close, &payload) {
                        debug!("websocket [{id}] unable to send close frame: {err}");
                    }
                }
                debug!("websocket [{id}] outbound worker stopped");
            }
            Exit::Disconnected => debug!("websocket [{id}] outbound worker disconnected"),
            Exit::Failed(err) => {
                warn!("websocket [{id}] outbound worker failed: {err}");
                self.shared.mark_closed();
            }
        }
    }

    #[inline]
    fn send(&mut self, op_code: OpCode, payload: &[u8]) -> io::Result<()> {
        let mask = self.config.role.masks_output().then(rand::random::<[u8; 4]>);
        encoder::send(&mut self.writer, op_code, mask, payload)
    }
}

/// Join handle of the worker thread plus a signal raised when its loop has exited.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl WorkerHandle {
    /// Wait for the worker loop to exit. Returns false if it is still running after `timeout`.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    pub fn join(self, id: u64) {
        if self.handle.join().is_err() {
            error!("websocket [{id}] outbound worker panicked");
        }
    }
}

/// Bounded outbound queue. A zero capacity is raised to one.
pub(crate) fn queue(capacity: usize) -> (SyncSender<Command>, Receiver<Command>) {
    std::sync::mpsc::sync_channel(capacity.max(1))
}
