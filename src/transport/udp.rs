//! UDP transport.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use super::Transport;
use crate::error::{Error, Result};

/// Largest possible UDP payload (65535 - 20 IPv4 - 8 UDP).
const MAX_DATAGRAM: usize = 65507;

/// A dedicated UDP socket connected to one agent.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local socket and connect it to `peer`.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let socket = bind_ephemeral(peer).await.map_err(|source| Error::Io {
            target: Some(peer),
            source,
        })?;
        socket.connect(peer).await.map_err(|source| Error::Io {
            target: Some(peer),
            source,
        })?;

        Ok(Self {
            socket: Arc::new(socket),
            peer,
        })
    }

    /// Local bind address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|source| Error::Io {
            target: Some(self.peer),
            source,
        })
    }
}

impl Transport for UdpTransport {
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        let socket = self.socket.clone();
        let peer = self.peer;
        let data = data.to_vec();
        async move {
            socket.send(&data).await.map_err(|source| Error::Io {
                target: Some(peer),
                source,
            })?;
            Ok(())
        }
    }

    fn recv(
        &self,
        _request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes>> + Send {
        let socket = self.socket.clone();
        let peer = self.peer;
        async move {
            let start = Instant::now();
            let mut buf = vec![0u8; MAX_DATAGRAM];

            match tokio::time::timeout(timeout, socket.recv(&mut buf)).await {
                Ok(Ok(len)) => {
                    buf.truncate(len);
                    Ok(Bytes::from(buf))
                }
                Ok(Err(source)) => Err(Error::Io {
                    target: Some(peer),
                    source,
                }),
                Err(_) => Err(Error::Timeout {
                    target: Some(peer),
                    elapsed: start.elapsed(),
                }),
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

/// Bind an ephemeral UDP socket in the peer's address family.
///
/// IPv6 sockets get `IPV6_V6ONLY` so they never see IPv4-mapped
/// addresses.
async fn bind_ephemeral(peer: SocketAddr) -> io::Result<UdpSocket> {
    let (domain, bind_addr): (Domain, SocketAddr) = if peer.is_ipv6() {
        (Domain::IPV6, "[::]:0".parse().unwrap())
    } else {
        (Domain::IPV4, "0.0.0.0:0".parse().unwrap())
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if peer.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&bind_addr.into())?;

    UdpSocket::from_std(socket.into())
}
