//! Transports on top of which the websocket protocol can be applied.

use std::io;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

pub mod memory;

/// Byte stream that can be split into independently owned read and write handles.
///
/// The websocket keeps one handle for inbound reads and hands the other one to its outbound
/// worker, so both directions proceed without sharing a lock.
pub trait Transport: Read + Write + Send + Sized + 'static {
    /// Create another handle to the same underlying connection.
    fn try_split(&self) -> io::Result<Self>;

    /// Shut down both directions. Blocked reads return end of stream and blocked writes fail.
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn try_split(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn shutdown(&self) -> io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            res => res,
        }
    }
}

#[cfg(unix)]
impl Transport for std::os::unix::net::UnixStream {
    fn try_split(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn shutdown(&self) -> io::Result<()> {
        match std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both) {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            res => res,
        }
    }
}
