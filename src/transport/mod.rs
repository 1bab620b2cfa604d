//! # Transport Module
//!
//! Outbound UDP channel to the vehicle-side receiver.
//!
//! This module handles:
//! - Resolving the `host:port` receiver address
//! - Binding an ephemeral local socket and connecting it to the receiver
//! - Fire-and-forget datagram writes (no acks, no retries, no reads)

pub mod channel;

pub use channel::Transport;

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

use crate::error::{Result, UplinkError};

/// UDP transport connected to a single receiver
pub struct UdpTransport {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl UdpTransport {
    /// Open a UDP channel to the receiver
    ///
    /// # Arguments
    ///
    /// * `address` - Receiver address in `host:port` form
    ///
    /// # Errors
    ///
    /// Returns [`UplinkError::Transport`] if the address does not resolve or
    /// the local socket cannot be bound/connected.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_uplink::transport::UdpTransport;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let transport = UdpTransport::connect("192.168.1.50:1053").await?;
    ///     println!("sending to {}", transport.remote_addr());
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(address: &str) -> Result<Self> {
        let wrap = |source: io::Error| UplinkError::Transport {
            address: address.to_string(),
            source,
        };

        let remote = tokio::net::lookup_host(address)
            .await
            .map_err(wrap)?
            .next()
            .ok_or_else(|| {
                wrap(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "address did not resolve",
                ))
            })?;

        let local = if remote.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local).await.map_err(wrap)?;
        socket.connect(remote).await.map_err(wrap)?;

        info!("UDP transport connected to {}", remote);
        Ok(Self { socket, remote })
    }

    /// Receiver address the socket is connected to
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send(datagram).await?;
        trace!("Sent datagram ({} bytes) to {}", datagram.len(), self.remote);
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        debug!("Closing UDP transport to {}", self.remote);
    }
}
