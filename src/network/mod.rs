//! Network subsystem for UDP block transport
//!
//! A [`Transport`] opens sessions to one fixed destination. A session is
//! used until its first send failure and is then closed and replaced.

pub mod memory;
pub mod udp;

pub use memory::{MemoryTransport, TransportScript};
pub use udp::{create_socket, UdpSession, UdpTransport};

use std::net::SocketAddrV4;

use crate::config::NetworkConfig;
use crate::error::TransportError;

/// One outbound datagram endpoint
pub trait DatagramSession: Send {
    /// Send `payload` as exactly one datagram
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Shut the endpoint down and release it
    fn close(self: Box<Self>);
}

/// Factory for sessions bound to a fixed destination
pub trait Transport: Send {
    fn open(&mut self) -> Result<Box<dyn DatagramSession>, TransportError>;

    fn destination(&self) -> SocketAddrV4;
}

/// Build the transport selected in the configuration
pub fn open_transport(config: &NetworkConfig) -> Box<dyn Transport> {
    if config.dry_run {
        Box::new(MemoryTransport::new(config.destination))
    } else {
        Box::new(UdpTransport::new(config.destination, config.send_buffer_bytes))
    }
}
