use std::io;
use std::io::Write;

use base64::engine::general_purpose;
use base64::Engine;
use http::header::SEC_WEBSOCKET_KEY;
use http::Request;
use log::debug;
use sha1::{Digest, Sha1};

use crate::stream::Transport;
use crate::ws::{Config, Error, HandshakeError, Role, Websocket};

/// Fixed GUID appended to the client key before hashing.
const WS_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Response sink that can hand its underlying stream over, detaching it from the http layer.
pub trait Hijack {
    type Stream: Transport;

    /// Take the stream. The http layer must not touch it afterwards.
    fn hijack(&mut self) -> io::Result<Hijacked<Self::Stream>>;
}

/// Stream detached from the http layer together with any bytes it had already read past the
/// request head.
#[derive(Debug)]
pub struct Hijacked<S> {
    pub stream: S,
    pub read_ahead: Vec<u8>,
}

/// Compute the `Sec-WebSocket-Accept` token for a client key.
///
/// ```
/// use socketeer::ws::compute_accept_key;
///
/// assert_eq!("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=", compute_accept_key(b"dGhlIHNhbXBsZSBub25jZQ=="));
/// ```
pub fn compute_accept_key(key: &[u8]) -> String {
    let mut sha = Sha1::new();
    sha.update(key);
    sha.update(WS_GUID);
    general_purpose::STANDARD.encode(sha.finalize())
}

/// Upgrade `request` to a websocket with the default [`Config`].
pub fn upgrade<B, H: Hijack>(request: &Request<B>, response: &mut H) -> Result<Websocket<H::Stream>, Error> {
    upgrade_with_config(request, response, Config::default())
}

/// Answer the opening handshake and build a server side websocket on the hijacked stream.
///
/// The key is validated before the stream is hijacked, so on [`HandshakeError::MissingKey`] the
/// http layer still owns the connection and can reply with an error status. The stream is split
/// before the 101 response goes out, a transport that cannot be split fails with
/// [`HandshakeError::Transport`] without anything written to the peer.
pub fn upgrade_with_config<B, H: Hijack>(
    request: &Request<B>,
    response: &mut H,
    config: Config,
) -> Result<Websocket<H::Stream>, Error> {
    let key = request
        .headers()
        .get(SEC_WEBSOCKET_KEY)
        .map(|value| value.as_bytes())
        .filter(|key| !key.is_empty())
        .ok_or(HandshakeError::MissingKey)?;
    let accept = compute_accept_key(key);

    let Hijacked { stream, read_ahead } = response.hijack().map_err(HandshakeError::NotHijackable)?;
    let mut writer = stream.try_split().map_err(HandshakeError::Transport)?;
    send_handshake_response(&mut writer, &accept).map_err(HandshakeError::Write)?;
    debug!("switched protocols for {} (accept: {accept})", request.uri());

    let ws = Websocket::from_split(stream, writer, read_ahead, Role::Server, config)
        .map_err(HandshakeError::Transport)?;
    Ok(ws)
}

fn send_handshake_response<S: Write>(stream: &mut S, accept: &str) -> io::Result<()> {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    buf.extend_from_slice(b"Upgrade: websocket\r\n");
    buf.extend_from_slice(b"Connection: Upgrade\r\n");
    buf.extend_from_slice(b"Sec-WebSocket-Accept: ");
    buf.extend_from_slice(accept.as_bytes());
    buf.extend_from_slice(b"\r\n\r\n");
    stream.write_all(&buf)?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::stream::memory::{self, MemoryStream};

    struct Sink {
        stream: Option<MemoryStream>,
        read_ahead: Vec<u8>,
    }

    impl Hijack for Sink {
        type Stream = MemoryStream;

        fn hijack(&mut self) -> io::Result<Hijacked<Self::Stream>> {
            let stream = self
                .stream
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "already hijacked"))?;
            Ok(Hijacked {
                stream,
                read_ahead: std::mem::take(&mut self.read_ahead),
            })
        }
    }

    /// Stream that refuses to hand out a second handle.
    #[derive(Debug)]
    struct Unsplittable(MemoryStream);

    impl Read for Unsplittable {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for Unsplittable {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.0.flush()
        }
    }

    impl Transport for Unsplittable {
        fn try_split(&self) -> io::Result<Self> {
            Err(io::Error::other("cannot split"))
        }

        fn shutdown(&self) -> io::Result<()> {
            self.0.shutdown()
        }
    }

    struct UnsplittableSink(Option<Unsplittable>);

    impl Hijack for UnsplittableSink {
        type Stream = Unsplittable;

        fn hijack(&mut self) -> io::Result<Hijacked<Self::Stream>> {
            let stream = self
                .0
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "already hijacked"))?;
            Ok(Hijacked {
                stream,
                read_ahead: Vec::new(),
            })
        }
    }

    fn request(key: Option<&str>) -> Request<()> {
        let mut builder = Request::get("/chat")
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade");
        if let Some(key) = key {
            builder = builder.header("Sec-WebSocket-Key", key);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn should_compute_rfc_accept_key() {
        assert_eq!("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=", compute_accept_key(b"dGhlIHNhbXBsZSBub25jZQ=="));
    }

    #[test]
    fn should_write_switching_protocols_response() {
        let (server, mut client) = memory::pair();
        let mut sink = Sink {
            stream: Some(server),
            read_ahead: Vec::new(),
        };
        let mut ws = upgrade(&request(Some("dGhlIHNhbXBsZSBub25jZQ==")), &mut sink).unwrap();

        let expected = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(expected.as_slice(), buf.as_slice());

        ws.close().unwrap();
    }

    #[test]
    fn should_reject_missing_key_without_hijacking() {
        let (server, _client) = memory::pair();
        let mut sink = Sink {
            stream: Some(server),
            read_ahead: Vec::new(),
        };
        let err = upgrade(&request(None), &mut sink).err().unwrap();
        assert!(matches!(err, Error::Handshake(HandshakeError::MissingKey)));
        assert!(sink.stream.is_some());

        let err = upgrade(&request(Some("")), &mut sink).err().unwrap();
        assert!(matches!(err, Error::Handshake(HandshakeError::MissingKey)));
    }

    #[test]
    fn should_reject_stream_that_cannot_be_hijacked() {
        let mut sink = Sink {
            stream: None,
            read_ahead: Vec::new(),
        };
        let err = upgrade(&request(Some("dGhlIHNhbXBsZSBub25jZQ==")), &mut sink).err().unwrap();
        assert!(matches!(err, Error::Handshake(HandshakeError::NotHijackable(_))));
    }

    #[test]
    fn should_report_failed_response_write() {
        let (server, client) = memory::pair();
        Transport::shutdown(&client).unwrap();
        let mut sink = Sink {
            stream: Some(server),
            read_ahead: Vec::new(),
        };
        let err = upgrade(&request(Some("dGhlIHNhbXBsZSBub25jZQ==")), &mut sink).err().unwrap();
        assert!(matches!(err, Error::Handshake(HandshakeError::Write(_))));
    }

    #[test]
    fn should_report_transport_that_cannot_be_split_before_responding() {
        let (server, mut client) = memory::pair();
        let mut sink = UnsplittableSink(Some(Unsplittable(server)));
        let err = upgrade(&request(Some("dGhlIHNhbXBsZSBub25jZQ==")), &mut sink).err().unwrap();
        assert!(matches!(err, Error::Handshake(HandshakeError::Transport(_))));

        // nothing reached the peer, in particular no 101 response
        Transport::shutdown(&client).unwrap();
        let mut received = Vec::new();
        client.read_to_end(&mut received).unwrap();
        assert!(received.is_empty());
    }
}
