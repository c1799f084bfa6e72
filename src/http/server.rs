use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use http::Request;
use log::debug;
use socket2::{Domain, Protocol, Socket, Type};

use crate::http::{read_request, ResponseSink};

const LISTEN_BACKLOG: i32 = 128;

/// Default time a client gets to deliver its request head.
pub const DEFAULT_HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking TCP listener that yields parsed requests together with their response sink.
///
/// Request heads are read on the accepting thread, bounded by the head timeout, so a client that
/// connects and stays silent delays the next `accept` by at most that long.
///
/// ```no_run
/// use http::StatusCode;
/// use socketeer::http::HttpServer;
/// use socketeer::ws;
///
/// let server = HttpServer::bind("127.0.0.1:9001").unwrap();
/// for exchange in server.incoming() {
///     let (request, mut response) = exchange.unwrap();
///     match ws::upgrade(&request, &mut response) {
///         Ok(_ws) => { /* hand the websocket to a thread */ }
///         Err(_) => response.respond(StatusCode::BAD_REQUEST, b"").unwrap(),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    head_timeout: Duration,
}

impl HttpServer {
    /// Bind with `SO_REUSEADDR` so that restarted servers can take the port over immediately.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::other("unable to resolve socket address"))?;
        let socket = Socket::new(
            match &addr {
                SocketAddr::V4(_) => Domain::IPV4,
                SocketAddr::V6(_) => Domain::IPV6,
            },
            Type::STREAM,
            Some(Protocol::TCP),
        )?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        Ok(Self {
            listener: socket.into(),
            head_timeout: DEFAULT_HEAD_TIMEOUT,
        })
    }

    /// Time allowed for a client to send its request head, zero is raised to one millisecond.
    pub fn with_head_timeout(self, head_timeout: Duration) -> Self {
        Self {
            head_timeout: head_timeout.max(Duration::from_millis(1)),
            ..self
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept the next connection and read its request head. Fails with `WouldBlock` or
    /// `TimedOut` if the head does not arrive within the head timeout, the connection is dropped.
    pub fn accept(&self) -> io::Result<(Request<()>, ResponseSink<TcpStream>)> {
        let (mut stream, peer) = self.listener.accept()?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.head_timeout))?;
        let (request, read_ahead) = read_request(&mut stream).inspect_err(|err| {
            debug!("{peer} request head not received: {err}");
        })?;
        stream.set_read_timeout(None)?;
        debug!("{peer} {} {}", request.method(), request.uri());
        Ok((request, ResponseSink::new(stream, read_ahead)))
    }

    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { server: self }
    }
}

pub struct Incoming<'a> {
    server: &'a HttpServer,
}

impl Iterator for Incoming<'_> {
    type Item = io::Result<(Request<()>, ResponseSink<TcpStream>)>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.server.accept())
    }
}
