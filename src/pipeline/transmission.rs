//! Transmission loop: handoff queue → network
//!
//! ```text
//!            open ok
//! DISCONNECTED ───────▶ CONNECTED ──┐ send ok / queue empty
//!      ▲                    │  ▲────┘
//!      └────────────────────┘
//!        send failed (session closed, block discarded)
//! ```
//!
//! Delivery is at-most-once: a block whose send fails is never retried.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::BlockConsumer;
use crate::config::ReconnectPolicy;
use crate::error::TransportError;
use crate::network::{DatagramSession, Transport};
use crate::pipeline::stats::PipelineStats;

enum SessionState {
    Disconnected,
    Connected(Box<dyn DatagramSession>),
}

pub struct TransmissionLoop {
    transport: Box<dyn Transport>,
    consumer: BlockConsumer,
    policy: ReconnectPolicy,
    reconnect_delay: Duration,
    idle_wait: Duration,
    stats: Arc<PipelineStats>,
}

impl TransmissionLoop {
    pub fn new(
        transport: Box<dyn Transport>,
        consumer: BlockConsumer,
        policy: ReconnectPolicy,
        reconnect_delay: Duration,
        idle_wait: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            transport,
            consumer,
            policy,
            reconnect_delay,
            idle_wait,
            stats,
        }
    }

    /// Run until the queue is closed and drained, or session creation fails
    /// under [`ReconnectPolicy::Abort`]
    pub fn run(mut self) -> Result<(), TransportError> {
        let destination = self.transport.destination();
        let mut state = SessionState::Disconnected;

        loop {
            state = match state {
                SessionState::Disconnected if self.consumer.is_closed() => {
                    tracing::info!("Handoff queue closed and drained while disconnected, ending transmission");
                    return Ok(());
                }
                SessionState::Disconnected => match self.transport.open() {
                    Ok(session) => {
                        self.stats.record_session_opened();
                        tracing::info!(%destination, "Session created");
                        SessionState::Connected(session)
                    }
                    Err(e) => {
                        self.stats.record_session_open_failure();
                        tracing::error!(%destination, "Failed to create session: {}", e);
                        if self.policy == ReconnectPolicy::Abort {
                            return Err(e);
                        }
                        thread::sleep(self.reconnect_delay);
                        SessionState::Disconnected
                    }
                },

                SessionState::Connected(mut session) => match self.consumer.try_dequeue() {
                    Ok(Some(block)) => match session.send(block.data()) {
                        Ok(()) => {
                            self.stats.record_sent(block.len());
                            SessionState::Connected(session)
                        }
                        Err(e) => {
                            self.stats.record_send_failure();
                            tracing::error!(sequence = block.sequence(), "Send failed: {}", e);
                            tracing::warn!("Closing session and reconnecting");
                            session.close();
                            SessionState::Disconnected
                        }
                    },
                    Ok(None) => {
                        self.idle();
                        SessionState::Connected(session)
                    }
                    Err(_) => {
                        tracing::info!("Handoff queue closed and drained, ending transmission");
                        session.close();
                        return Ok(());
                    }
                },
            };
        }
    }

    fn idle(&self) {
        if self.idle_wait.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.idle_wait);
        }
    }
}
