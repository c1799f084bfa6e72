//! Minimal blocking HTTP/1.1 front-end: reads a request head, answers plain requests and hands the
//! connection over to the websocket upgrade.

use std::io;
use std::io::{ErrorKind, Read};

use http::{Request, StatusCode, Version};
use httparse::EMPTY_HEADER;
use memchr::memmem;

use crate::stream::Transport;
use crate::ws::{Hijack, Hijacked};

pub use server::HttpServer;

mod server;

/// Upper bound on the size of a request head.
pub const MAX_HEAD_LEN: usize = 8 * 1024;
const MAX_HEADERS: usize = 64;
const READ_CHUNK_SIZE: usize = 1024;

/// Read and parse a request head. Returns the request and the bytes read past the head, which
/// belong to whatever protocol follows.
pub fn read_request<S: Read>(stream: &mut S) -> io::Result<(Request<()>, Vec<u8>)> {
    let mut buf = Vec::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let head_len = loop {
        // a terminator may straddle two reads
        let search_from = buf.len().saturating_sub(3);
        let read = match stream.read(&mut chunk) {
            Ok(0) => return Err(io::Error::new(ErrorKind::UnexpectedEof, "connection closed before request head")),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        buf.extend_from_slice(&chunk[..read]);
        if let Some(pos) = memmem::find(&buf[search_from..], b"\r\n\r\n") {
            break search_from + pos + 4;
        }
        if buf.len() > MAX_HEAD_LEN {
            return Err(io::Error::new(ErrorKind::InvalidData, "request head too large"));
        }
    };

    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);
    parsed
        .parse(&buf[..head_len])
        .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;

    let mut builder = Request::builder()
        .method(parsed.method.unwrap_or_default())
        .uri(parsed.path.unwrap_or("/"))
        .version(match parsed.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        });
    for header in parsed.headers.iter() {
        builder = builder.header(header.name, header.value);
    }
    let request = builder
        .body(())
        .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;

    Ok((request, buf.split_off(head_len)))
}

/// Response side of a single http exchange. It either answers the request or gets hijacked by the
/// websocket upgrade, never both.
#[derive(Debug)]
pub struct ResponseSink<S> {
    stream: Option<S>,
    read_ahead: Vec<u8>,
}

impl<S: Transport> ResponseSink<S> {
    pub fn new(stream: S, read_ahead: Vec<u8>) -> Self {
        Self {
            stream: Some(stream),
            read_ahead,
        }
    }

    /// Send a complete response and close the connection.
    pub fn respond(&mut self, status: StatusCode, body: &[u8]) -> io::Result<()> {
        let mut stream = self.take_stream()?;
        write!(
            stream,
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            body.len()
        )?;
        stream.write_all(body)?;
        stream.flush()?;
        stream.shutdown()
    }

    /// Checks if the stream is still owned by the http layer.
    pub fn is_attached(&self) -> bool {
        self.stream.is_some()
    }

    fn take_stream(&mut self) -> io::Result<S> {
        self.stream
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "response stream already detached"))
    }
}

impl<S: Transport> Hijack for ResponseSink<S> {
    type Stream = S;

    fn hijack(&mut self) -> io::Result<Hijacked<S>> {
        let stream = self.take_stream()?;
        Ok(Hijacked {
            stream,
            read_ahead: std::mem::take(&mut self.read_ahead),
        })
    }
}
