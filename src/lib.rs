//! Websocket protocol engine layered over a blocking HTTP/1.1 server.
//!
//! The [`ws`] module performs the opening handshake on a hijacked http connection, encodes and
//! decodes frames and serializes outbound writes through one worker thread per connection. The
//! optional [`http`](crate::http) module provides the minimal front-end needed to accept upgrade requests.

#[cfg(feature = "http")]
pub mod http;
pub mod stream;
mod util;
pub mod ws;
