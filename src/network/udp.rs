//! UDP sessions over socket2

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::SocketAddrV4;

use super::{DatagramSession, Transport};
use crate::constants::MAX_DATAGRAM_PAYLOAD;
use crate::error::TransportError;

/// Create an unbound IPv4 datagram socket
pub fn create_socket(send_buffer_bytes: Option<usize>) -> Result<Socket, TransportError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| TransportError::SocketFailed(e.to_string()))?;

    if let Some(size) = send_buffer_bytes {
        if let Err(e) = socket.set_send_buffer_size(size) {
            tracing::warn!("Failed to set send buffer size to {}: {}", size, e);
        }
    }

    Ok(socket)
}

/// Opens a fresh UDP socket per session
pub struct UdpTransport {
    destination: SocketAddrV4,
    send_buffer_bytes: Option<usize>,
}

impl UdpTransport {
    pub fn new(destination: SocketAddrV4, send_buffer_bytes: Option<usize>) -> Self {
        Self {
            destination,
            send_buffer_bytes,
        }
    }
}

impl Transport for UdpTransport {
    fn open(&mut self) -> Result<Box<dyn DatagramSession>, TransportError> {
        let socket = create_socket(self.send_buffer_bytes)?;
        Ok(Box::new(UdpSession {
            socket,
            destination: SockAddr::from(self.destination),
        }))
    }

    fn destination(&self) -> SocketAddrV4 {
        self.destination
    }
}

pub struct UdpSession {
    socket: Socket,
    destination: SockAddr,
}

impl DatagramSession for UdpSession {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_DATAGRAM_PAYLOAD {
            return Err(TransportError::PacketTooLarge(payload.len()));
        }

        let sent = self
            .socket
            .send_to(payload, &self.destination)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if sent != payload.len() {
            return Err(TransportError::ShortSend {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }

    fn close(self: Box<Self>) {
        drop(self);
    }
}
