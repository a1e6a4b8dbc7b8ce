//! In-process transport
//!
//! Records every datagram instead of sending it, and can be scripted to fail
//! session creation or sends. Used for dry runs and by the pipeline tests.

use bytes::Bytes;
use parking_lot::Mutex;
use std::net::SocketAddrV4;
use std::sync::Arc;

use super::{DatagramSession, Transport};
use crate::error::TransportError;

#[derive(Default)]
struct ScriptState {
    /// Remaining `open` calls that will fail
    open_failures: usize,
    /// Remaining `send` calls that will fail
    send_failures: usize,
    datagrams: Vec<Bytes>,
    open_attempts: usize,
    sessions_opened: usize,
    sessions_closed: usize,
    send_attempts: usize,
}

/// Shared control and inspection handle for a [`MemoryTransport`]
#[derive(Clone, Default)]
pub struct TransportScript {
    state: Arc<Mutex<ScriptState>>,
}

impl TransportScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` session creations fail
    pub fn fail_next_opens(&self, n: usize) -> &Self {
        self.state.lock().open_failures += n;
        self
    }

    /// Make the next `n` sends fail
    pub fn fail_next_sends(&self, n: usize) -> &Self {
        self.state.lock().send_failures += n;
        self
    }

    /// Payloads delivered so far, in order
    pub fn datagrams(&self) -> Vec<Bytes> {
        self.state.lock().datagrams.clone()
    }

    pub fn open_attempts(&self) -> usize {
        self.state.lock().open_attempts
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().sessions_opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.lock().sessions_closed
    }

    pub fn send_attempts(&self) -> usize {
        self.state.lock().send_attempts
    }
}

pub struct MemoryTransport {
    destination: SocketAddrV4,
    script: TransportScript,
}

impl MemoryTransport {
    pub fn new(destination: SocketAddrV4) -> Self {
        Self::with_script(destination, TransportScript::new())
    }

    pub fn with_script(destination: SocketAddrV4, script: TransportScript) -> Self {
        Self {
            destination,
            script,
        }
    }

    pub fn script(&self) -> TransportScript {
        self.script.clone()
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self) -> Result<Box<dyn DatagramSession>, TransportError> {
        let mut state = self.script.state.lock();
        state.open_attempts += 1;
        if state.open_failures > 0 {
            state.open_failures -= 1;
            return Err(TransportError::SocketFailed("scripted failure".into()));
        }
        state.sessions_opened += 1;
        drop(state);

        Ok(Box::new(MemorySession {
            script: self.script.clone(),
        }))
    }

    fn destination(&self) -> SocketAddrV4 {
        self.destination
    }
}

struct MemorySession {
    script: TransportScript,
}

impl DatagramSession for MemorySession {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.script.state.lock();
        state.send_attempts += 1;
        if state.send_failures > 0 {
            state.send_failures -= 1;
            return Err(TransportError::SendFailed("scripted failure".into()));
        }
        state.datagrams.push(Bytes::copy_from_slice(payload));
        Ok(())
    }

    fn close(self: Box<Self>) {
        self.script.state.lock().sessions_closed += 1;
    }
}
