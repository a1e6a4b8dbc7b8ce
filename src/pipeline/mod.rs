//! Streaming pipeline: acquisition thread → handoff queue → transmission thread
//!
//! [`Pipeline::start`] is the only place the queue is created. The producer
//! end moves into the acquisition thread and the consumer end into the
//! transmission thread; nothing else is shared except the counters.

pub mod acquisition;
pub mod stats;
pub mod transmission;

pub use acquisition::AcquisitionLoop;
pub use stats::{PipelineStats, StatsSnapshot};
pub use transmission::TransmissionLoop;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::{self, handoff_queue, AcquisitionSource, QueueSizing};
use crate::config::AppConfig;
use crate::error::{AcquisitionError, Error, Result, TransportError};
use crate::network::{self, Transport};

/// A configured pipeline that has not started yet
pub struct Pipeline {
    config: AppConfig,
    source: Box<dyn AcquisitionSource>,
    transport: Box<dyn Transport>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        source: Box<dyn AcquisitionSource>,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            transport,
        })
    }

    /// Build source and transport from the configuration
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let source = audio::open_source(&config.acquisition)?;
        let transport = network::open_transport(&config.network);
        Self::new(config, source, transport)
    }

    /// Log whether the queue can ride out a reconnect
    fn check_queue_sizing(&self) {
        let sizing = QueueSizing::new(self.config.queue.capacity, self.config.acquisition.block_period());
        let stall = self.config.network.expected_reconnect();

        if sizing.absorbs(stall) {
            tracing::info!(
                "Handoff queue: {} blocks of {} bytes, {:?} of headroom",
                sizing.capacity,
                self.config.acquisition.block_size,
                sizing.headroom()
            );
        } else {
            tracing::warn!(
                "Handoff queue headroom {:?} is below the expected reconnect time {:?}; \
                 blocks will be dropped during reconnects (needs capacity {})",
                sizing.headroom(),
                stall,
                sizing.required_capacity(stall)
            );
        }
    }

    /// Create the queue and spawn both loops
    pub fn start(self) -> Result<PipelineHandle> {
        self.check_queue_sizing();

        let Pipeline {
            config,
            source,
            transport,
        } = self;

        let stats = Arc::new(PipelineStats::new());
        let (producer, consumer) = handoff_queue(config.queue.capacity);

        let transmission = TransmissionLoop::new(
            transport,
            consumer,
            config.network.reconnect,
            config.network.reconnect_delay(),
            config.tasks.idle_wait(),
            stats.clone(),
        );
        let transmission = spawn_pinned("transmit", config.tasks.transmission_core, move || {
            transmission.run()
        })?;

        let acquisition = AcquisitionLoop::new(
            source,
            producer,
            config.acquisition.block_size,
            config.queue.enqueue_wait(),
            stats.clone(),
        );
        let acquisition = spawn_pinned("acquire", config.tasks.acquisition_core, move || {
            acquisition.run()
        })?;

        Ok(PipelineHandle {
            acquisition,
            transmission,
            stats,
        })
    }
}

/// Spawn a named thread, pinned to `core` when one is given
fn spawn_pinned<F, T>(name: &str, core: Option<usize>, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            if let Some(core) = core {
                pin_current_thread(&thread_name, core);
            }
            f()
        })
        .map_err(Error::Io)
}

fn pin_current_thread(name: &str, core: usize) {
    let target = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == core));

    match target {
        Some(id) if core_affinity::set_for_current(id) => {
            tracing::debug!("Thread {} pinned to core {}", name, core);
        }
        Some(_) => tracing::warn!("Failed to pin thread {} to core {}", name, core),
        None => tracing::warn!("Core {} not available for thread {}", core, name),
    }
}

/// How each loop ended
#[derive(Debug)]
pub struct PipelineExit {
    pub acquisition: Result<()>,
    pub transmission: Result<()>,
}

/// Running pipeline
pub struct PipelineHandle {
    acquisition: JoinHandle<std::result::Result<(), AcquisitionError>>,
    transmission: JoinHandle<std::result::Result<(), TransportError>>,
    stats: Arc<PipelineStats>,
}

impl PipelineHandle {
    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.acquisition.is_finished() && self.transmission.is_finished()
    }

    /// Wait for both loops to end
    pub fn join(self) -> PipelineExit {
        let acquisition = match self.acquisition.join() {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::ThreadPanicked("acquire")),
        };
        let transmission = match self.transmission.join() {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::ThreadPanicked("transmit")),
        };

        PipelineExit {
            acquisition,
            transmission,
        }
    }
}
