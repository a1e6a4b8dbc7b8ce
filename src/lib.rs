//! # UDP Audio Streamer
//!
//! Raw audio acquisition forwarded, unmodified, as fixed-size UDP datagrams
//! to a single remote collector.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                                 DEVICE                                   │
//! │                                                                          │
//! │  ┌────────────────────┐                         ┌────────────────────┐   │
//! │  │ Acquisition Source │                         │  Transport Session │   │
//! │  │ (audio::source)    │                         │  (network::udp)    │   │
//! │  └─────────┬──────────┘                         └─────────▲──────────┘   │
//! │            │ read(BLOCK_SIZE)                   send_to   │              │
//! │            ▼                                              │              │
//! │  ┌────────────────────┐   ┌───────────────────┐   ┌───────┴──────────┐   │
//! │  │  Acquisition Loop  │──▶│   Handoff Queue   │──▶│ Transmission Loop│   │
//! │  │  thread "acquire"  │   │ (audio::buffer)   │   │ thread "transmit"│   │
//! │  │  core N            │   │ SPSC, bounded,    │   │ core M           │   │
//! │  │                    │   │ drop-newest       │   │ reconnect on fail│   │
//! │  └────────────────────┘   └───────────────────┘   └──────────────────┘   │
//! │                                                                          │
//! └───────────────────────────────────────┬──────────────────────────────────┘
//!                                         │ UDP, payload = BLOCK_SIZE raw bytes
//!                                         ▼
//!                                 ┌───────────────┐
//!                                 │   Collector   │
//!                                 └───────────────┘
//! ```
//!
//! The two loops share nothing but the queue. Each block is an owned buffer
//! moved through it, so the producer never writes into memory the consumer
//! is still reading.

pub mod audio;
pub mod config;
pub mod error;
pub mod network;
pub mod pipeline;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Bytes per sample block (and per datagram payload)
    pub const DEFAULT_BLOCK_SIZE: usize = 4096;

    /// Handoff queue capacity in blocks
    pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

    /// Sample rate of the standard (I2S) acquisition mode
    pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

    /// Sample rate of the PDM acquisition mode
    pub const PDM_SAMPLE_RATE: u32 = 44100;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Default collector port
    pub const DEFAULT_UDP_PORT: u16 = 3333;

    /// Largest UDP payload over IPv4
    pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

    /// Core the acquisition thread is pinned to by default
    pub const ACQUISITION_CORE: usize = 1;

    /// Core the transmission thread is pinned to by default
    pub const TRANSMISSION_CORE: usize = 0;

    /// Idle wait of the transmission loop when the queue is empty, in microseconds
    pub const DEFAULT_IDLE_WAIT_US: u64 = 1000;

    /// Delay before recreating a session after a creation failure, in milliseconds
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 100;

    /// Assumed worst-case time to bring up a fresh session, in milliseconds
    pub const DEFAULT_EXPECTED_RECONNECT_MS: u64 = 250;

    /// Interval between statistics log lines, in seconds
    pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 10;
}
