//! Pipeline counters shared by both loops

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    blocks_captured: AtomicU64,
    blocks_dropped: AtomicU64,
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_failures: AtomicU64,
    sessions_opened: AtomicU64,
    session_open_failures: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a block read from the source and then queued or dropped
    pub fn record_captured(&self) {
        self.blocks_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a block lost to a full queue
    pub fn record_dropped(&self) {
        self.blocks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a datagram handed to the network
    pub fn record_sent(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count a failed send (the block is discarded)
    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a session created
    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed session creation
    pub fn record_session_open_failure(&self) {
        self.session_open_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_captured: self.blocks_captured.load(Ordering::Relaxed),
            blocks_dropped: self.blocks_dropped.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            session_open_failures: self.session_open_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub blocks_captured: u64,
    pub blocks_dropped: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub sessions_opened: u64,
    pub session_open_failures: u64,
}

impl StatsSnapshot {
    /// Fraction of captured blocks lost to a full queue
    pub fn drop_rate(&self) -> f32 {
        if self.blocks_captured == 0 {
            0.0
        } else {
            self.blocks_dropped as f32 / self.blocks_captured as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = PipelineStats::new();
        for _ in 0..4 {
            stats.record_captured();
        }
        stats.record_dropped();
        stats.record_sent(4096);
        stats.record_sent(4096);
        stats.record_send_failure();
        stats.record_session_opened();

        let snap = stats.snapshot();
        assert_eq!(snap.blocks_captured, 4);
        assert_eq!(snap.datagrams_sent, 2);
        assert_eq!(snap.bytes_sent, 8192);
        assert_eq!(snap.send_failures, 1);
        assert_eq!(snap.drop_rate(), 0.25);
        assert_eq!(StatsSnapshot::default().drop_rate(), 0.0);
    }
}
