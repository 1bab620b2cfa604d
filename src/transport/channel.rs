//! Trait abstraction for the outbound datagram channel to enable testing

use async_trait::async_trait;
use std::io;

/// Fire-and-forget datagram sink
///
/// One call sends one datagram. There is no delivery confirmation; an
/// error means the local socket is unusable, not that a packet was lost.
#[async_trait]
pub trait Transport: Send {
    /// Send one datagram to the connected peer
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        (**self).send(datagram).await
    }
}
