//! Host capture channel backed by a cpal input stream
//!
//! cpal delivers samples through a callback on its own thread. The stream
//! lives on a dedicated keep-alive thread; the callback encodes samples to
//! the configured wire encoding and hands byte chunks over a channel, from
//! which `read` assembles fixed-size blocks.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::device::find_input_device;
use crate::audio::source::{AcquisitionSource, SampleEncoding};
use crate::config::AcquisitionConfig;
use crate::error::AcquisitionError;

/// Callback chunks buffered between the cpal thread and `read`
const CHUNK_QUEUE_DEPTH: usize = 64;

/// How often a blocked `read` checks for stream errors
const ERROR_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run of consecutive chunks the callback could not hand over
#[derive(Debug, Default)]
struct OverrunStreak {
    lost: u64,
}

impl OverrunStreak {
    /// Count a lost chunk; true when it starts a new streak
    fn lost(&mut self) -> bool {
        self.lost += 1;
        self.lost == 1
    }

    /// Count a delivered chunk; returns the streak length when one just ended
    fn delivered(&mut self) -> Option<u64> {
        match std::mem::take(&mut self.lost) {
            0 => None,
            lost => Some(lost),
        }
    }
}

pub struct DeviceSource {
    device_name: Option<String>,
    encoding: SampleEncoding,
    sample_rate: u32,

    /// Whether the stream thread should keep running
    running: Arc<AtomicBool>,

    thread_handle: Option<JoinHandle<()>>,
    chunk_rx: Option<Receiver<Vec<u8>>>,
    error_rx: Option<Receiver<AcquisitionError>>,

    /// Bytes received but not yet handed out
    pending: Vec<u8>,

    /// Chunks lost because `read` fell behind the callback
    overruns: Arc<AtomicU64>,
}

impl DeviceSource {
    pub fn new(
        device_name: Option<String>,
        encoding: SampleEncoding,
        sample_rate: u32,
    ) -> Result<Self, AcquisitionError> {
        // Fail early if the device is absent
        find_input_device(device_name.as_deref())?;

        Ok(Self {
            device_name,
            encoding,
            sample_rate,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            chunk_rx: None,
            error_rx: None,
            pending: Vec::new(),
            overruns: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, AcquisitionError> {
        Self::new(
            config.device.clone(),
            SampleEncoding::from_config(config)?,
            config.sample_rate(),
        )
    }

    /// Get number of callback chunks lost so far
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn stop_thread(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            let overruns = self.overruns();
            if overruns > 0 {
                tracing::warn!("Capture stream stopped with {} overrun chunks", overruns);
            }
        }
        self.chunk_rx = None;
        self.error_rx = None;
        self.pending.clear();
    }
}

impl AcquisitionSource for DeviceSource {
    fn enable(&mut self) -> Result<(), AcquisitionError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (chunk_tx, chunk_rx) = bounded::<Vec<u8>>(CHUNK_QUEUE_DEPTH);
        let (error_tx, error_rx) = bounded::<AcquisitionError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), AcquisitionError>>(1);

        let running = self.running.clone();
        let overruns = self.overruns.clone();
        let device_name = self.device_name.clone();
        let encoding = self.encoding;
        let config = StreamConfig {
            channels: encoding.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("capture-device".to_string())
            .spawn(move || {
                let device = match find_input_device(device_name.as_deref()) {
                    Ok(device) => device,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut streak = OverrunStreak::default();

                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mut bytes = Vec::with_capacity(data.len() * encoding.bytes_per_sample());
                        for &sample in data {
                            encoding.encode(sample, &mut bytes);
                        }
                        if chunk_tx.try_send(bytes).is_err() {
                            overruns.fetch_add(1, Ordering::Relaxed);
                            if streak.lost() {
                                tracing::warn!("Capture overrun, samples lost inside the next block");
                            }
                        } else if let Some(lost) = streak.delivered() {
                            tracing::info!("Capture caught up after {} lost chunks", lost);
                        }
                    },
                    move |err| {
                        let _ = error_tx.try_send(AcquisitionError::ReadFailed(err.to_string()));
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AcquisitionError::EnableFailed(e.to_string())));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AcquisitionError::EnableFailed(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream is dropped here, stopping capture
            })
            .map_err(|e| AcquisitionError::EnableFailed(e.to_string()))?;

        self.thread_handle = Some(handle);

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AcquisitionError::EnableFailed("capture thread exited".into())));
        if let Err(e) = started {
            self.stop_thread();
            return Err(e);
        }

        self.chunk_rx = Some(chunk_rx);
        self.error_rx = Some(error_rx);
        tracing::debug!("Capture stream started on {:?}", self.device_name);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], wait: Option<Duration>) -> Result<usize, AcquisitionError> {
        let (Some(chunk_rx), Some(error_rx)) = (self.chunk_rx.as_ref(), self.error_rx.as_ref()) else {
            return Err(AcquisitionError::NotEnabled);
        };

        let deadline = wait.map(|w| Instant::now() + w);

        while self.pending.len() < buf.len() {
            if let Ok(err) = error_rx.try_recv() {
                return Err(err);
            }

            let poll = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(AcquisitionError::Timeout);
                    }
                    (deadline - now).min(ERROR_POLL_INTERVAL)
                }
                None => ERROR_POLL_INTERVAL,
            };

            match chunk_rx.recv_timeout(poll) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AcquisitionError::ReadFailed("capture stream closed".into()));
                }
            }
        }

        buf.copy_from_slice(&self.pending[..buf.len()]);
        self.pending.drain(..buf.len());
        Ok(buf.len())
    }

    fn disable(&mut self) -> Result<(), AcquisitionError> {
        self.stop_thread();
        Ok(())
    }

    fn release(mut self: Box<Self>) {
        self.stop_thread();
    }

    fn name(&self) -> String {
        format!(
            "device {} @ {} Hz/{}-bit/{}ch",
            self.device_name.as_deref().unwrap_or("default"),
            self.sample_rate,
            self.encoding.bits_per_sample,
            self.encoding.channels
        )
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrun_streak_reports_start_and_end_once() {
        let mut streak = OverrunStreak::default();
        assert_eq!(streak.delivered(), None);

        assert!(streak.lost());
        assert!(!streak.lost());
        assert!(!streak.lost());
        assert_eq!(streak.delivered(), Some(3));
        assert_eq!(streak.delivered(), None);

        assert!(streak.lost());
        assert_eq!(streak.delivered(), Some(1));
    }
}
