//! Transport layer abstraction.
//!
//! The core treats a transport purely by its exchange contract: send a
//! fully-formed request datagram, receive one response datagram (or
//! fail). Retries, listener loops, and connection management live with
//! the caller, not here; the client performs exactly one exchange per
//! operation.

mod mock;
mod udp;

pub use mock::{MockResponse, MockTransport, RecordedRequest, ResponseBuilder};
pub use udp::UdpTransport;

use crate::error::Result;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Client-side transport abstraction.
///
/// `Clone` is required because walk streams own a clone of the client
/// (and therefore the transport); implementations wrap their state in
/// `Arc` so cloning is a reference-count bump.
pub trait Transport: Send + Sync + Clone {
    /// Send one request datagram to the peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Receive one response datagram.
    ///
    /// `request_id` is available for transports that demultiplex;
    /// `timeout` bounds the wait. Cancellation surfaces as an error from
    /// here and is propagated verbatim.
    fn recv(
        &self,
        request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes>> + Send;

    /// The peer address this transport exchanges with.
    fn peer_addr(&self) -> SocketAddr;
}
