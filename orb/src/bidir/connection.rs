use core::future::Future;

use crate::{error::OrbResult, reference::ObjectReference};

/// Which end of a connection this side is. Decides the request identifier
/// space so requests originated on either end never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The side that opened the connection.
    Initiator,
    /// The side that accepted it.
    Acceptor,
}

/// Outgoing half of an established duplex channel.
///
/// Framing is the implementor's concern: every call hands over exactly one
/// complete message. Incoming messages are fed to
/// [`BidirRouter::handle_incoming`](super::router::BidirRouter::handle_incoming)
/// by whoever reads the channel.
pub trait Connection: Send {
    /// Writes one whole message.
    fn send(&mut self, message: Vec<u8>) -> impl Future<Output = OrbResult<()>> + Send;
}

/// Establishes a new connection for a reference that is not bound to an
/// attached one.
pub trait ConnectionResolver<C: Connection> {
    fn resolve(&self, reference: &ObjectReference) -> impl Future<Output = OrbResult<C>> + Send;
}
