//! Acquisition source abstraction
//!
//! A source is a configured hardware channel that blocks the caller until a
//! requested number of bytes has been captured. How the channel is clocked
//! and wired is the implementation's business; the pipeline only enables it,
//! reads fixed-size blocks, and tears it down.

use std::f32::consts::PI;
use std::time::{Duration, Instant};

use crate::config::AcquisitionConfig;
use crate::error::AcquisitionError;

/// A capture channel yielding raw sample bytes
///
/// Implementations are moved into the acquisition thread, hence `Send`.
pub trait AcquisitionSource: Send {
    /// Start the channel. Called once before the first read.
    fn enable(&mut self) -> Result<(), AcquisitionError>;

    /// Fill `buf` completely, waiting up to `wait` (`None` waits forever).
    ///
    /// Returns the number of bytes written, which equals `buf.len()` on
    /// success.
    fn read(&mut self, buf: &mut [u8], wait: Option<Duration>) -> Result<usize, AcquisitionError>;

    /// Stop the channel
    fn disable(&mut self) -> Result<(), AcquisitionError>;

    /// Free the channel's resources
    fn release(self: Box<Self>);

    /// Human readable name for logs
    fn name(&self) -> String;
}

/// Native wire encoding of samples
///
/// Little-endian signed integers, interleaved. 24-bit samples sit
/// MSB-aligned in 32-bit slots, as an I2S peripheral delivers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEncoding {
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl SampleEncoding {
    pub fn new(bits_per_sample: u16, channels: u16) -> Result<Self, AcquisitionError> {
        if !matches!(bits_per_sample, 16 | 24 | 32) {
            return Err(AcquisitionError::UnsupportedFormat(format!(
                "{} bits per sample",
                bits_per_sample
            )));
        }
        if channels == 0 {
            return Err(AcquisitionError::UnsupportedFormat("zero channels".into()));
        }
        Ok(Self {
            bits_per_sample,
            channels,
        })
    }

    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, AcquisitionError> {
        Self::new(config.bits_per_sample(), config.channels)
    }

    pub fn bytes_per_sample(&self) -> usize {
        if self.bits_per_sample == 16 {
            2
        } else {
            4
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Append one sample in [-1.0, 1.0] to `out`
    pub fn encode(&self, sample: f32, out: &mut Vec<u8>) {
        let mut slot = [0u8; 4];
        let n = self.bytes_per_sample();
        self.encode_into(sample, &mut slot[..n]);
        out.extend_from_slice(&slot[..n]);
    }

    /// Write one sample into a slot of `bytes_per_sample()` bytes
    pub fn encode_into(&self, sample: f32, slot: &mut [u8]) {
        let s = sample.clamp(-1.0, 1.0);
        match self.bits_per_sample {
            16 => slot.copy_from_slice(&((s * i16::MAX as f32) as i16).to_le_bytes()),
            24 => {
                let v = (s * 8_388_607.0) as i32;
                slot.copy_from_slice(&(v << 8).to_le_bytes());
            }
            _ => slot.copy_from_slice(&((s as f64 * i32::MAX as f64) as i32).to_le_bytes()),
        }
    }
}

/// Peak level of the synthetic tone
const TONE_AMPLITUDE: f32 = 0.5;

/// Synthetic channel producing a sine tone at the configured cadence
///
/// Reads are paced against the sample clock, so the producer behaves like a
/// real peripheral: one block per block period.
pub struct ToneSource {
    encoding: SampleEncoding,
    sample_rate: u32,
    tone_hz: f32,
    phase: f32,
    enabled: bool,
    /// Capture time of the next byte to be produced
    clock: Option<Instant>,
}

impl ToneSource {
    pub fn new(encoding: SampleEncoding, sample_rate: u32, tone_hz: f32) -> Self {
        Self {
            encoding,
            sample_rate,
            tone_hz,
            phase: 0.0,
            enabled: false,
            clock: None,
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, AcquisitionError> {
        Ok(Self::new(
            SampleEncoding::from_config(config)?,
            config.sample_rate(),
            config.tone_hz,
        ))
    }

    fn frames_duration(&self, frames: usize) -> Duration {
        Duration::from_nanos(frames as u64 * 1_000_000_000 / self.sample_rate.max(1) as u64)
    }

    fn fill(&mut self, buf: &mut [u8]) {
        let sample_bytes = self.encoding.bytes_per_sample();
        let step = 2.0 * PI * self.tone_hz / self.sample_rate.max(1) as f32;

        for frame in buf.chunks_exact_mut(self.encoding.frame_bytes()) {
            let value = self.phase.sin() * TONE_AMPLITUDE;
            for slot in frame.chunks_exact_mut(sample_bytes) {
                self.encoding.encode_into(value, slot);
            }
            self.phase = (self.phase + step) % (2.0 * PI);
        }
    }
}

impl AcquisitionSource for ToneSource {
    fn enable(&mut self) -> Result<(), AcquisitionError> {
        self.enabled = true;
        self.clock = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], wait: Option<Duration>) -> Result<usize, AcquisitionError> {
        if !self.enabled {
            return Err(AcquisitionError::NotEnabled);
        }
        if buf.len() % self.encoding.frame_bytes() != 0 {
            return Err(AcquisitionError::UnsupportedFormat(format!(
                "read of {} bytes is not frame aligned",
                buf.len()
            )));
        }

        let frames = buf.len() / self.encoding.frame_bytes();
        let start = self.clock.unwrap_or_else(Instant::now);
        let ready_at = start + self.frames_duration(frames);

        let now = Instant::now();
        if ready_at > now {
            let remaining = ready_at - now;
            match wait {
                Some(budget) if budget < remaining => {
                    std::thread::sleep(budget);
                    return Err(AcquisitionError::Timeout);
                }
                _ => std::thread::sleep(remaining),
            }
        }

        self.fill(buf);
        self.clock = Some(ready_at);
        Ok(buf.len())
    }

    fn disable(&mut self) -> Result<(), AcquisitionError> {
        self.enabled = false;
        self.clock = None;
        Ok(())
    }

    fn release(self: Box<Self>) {}

    fn name(&self) -> String {
        format!(
            "tone {} Hz @ {} Hz/{}-bit/{}ch",
            self.tone_hz, self.sample_rate, self.encoding.bits_per_sample, self.encoding.channels
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_widths() {
        let mut out = Vec::new();
        SampleEncoding::new(16, 1).unwrap().encode(1.0, &mut out);
        assert_eq!(out, i16::MAX.to_le_bytes());

        out.clear();
        SampleEncoding::new(24, 1).unwrap().encode(1.0, &mut out);
        assert_eq!(out, (8_388_607i32 << 8).to_le_bytes());

        out.clear();
        SampleEncoding::new(32, 1).unwrap().encode(-1.0, &mut out);
        assert_eq!(out, (-i32::MAX).to_le_bytes());

        assert!(SampleEncoding::new(12, 1).is_err());
        assert!(SampleEncoding::new(16, 0).is_err());
    }

    #[test]
    fn test_tone_requires_enable() {
        let mut source = ToneSource::new(SampleEncoding::new(16, 1).unwrap(), 48000, 440.0);
        let mut buf = [0u8; 64];
        assert!(matches!(source.read(&mut buf, None), Err(AcquisitionError::NotEnabled)));
    }

    #[test]
    fn test_tone_fills_and_paces() {
        // 8000 Hz, 16-bit mono: 160 bytes = 80 frames = 10 ms
        let mut source = ToneSource::new(SampleEncoding::new(16, 1).unwrap(), 8000, 1000.0);
        source.enable().unwrap();

        let started = Instant::now();
        let mut buf = [0u8; 160];
        for _ in 0..3 {
            assert_eq!(source.read(&mut buf, None).unwrap(), 160);
        }
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_tone_rejects_misaligned_read() {
        let mut source = ToneSource::new(SampleEncoding::new(32, 2).unwrap(), 8000, 1000.0);
        source.enable().unwrap();
        let mut buf = [0u8; 12];
        assert!(matches!(
            source.read(&mut buf, None),
            Err(AcquisitionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_tone_short_wait_times_out() {
        // 1000 Hz, 16-bit mono: 2000 bytes = 1 s
        let mut source = ToneSource::new(SampleEncoding::new(16, 1).unwrap(), 1000, 100.0);
        source.enable().unwrap();
        let mut buf = vec![0u8; 2000];
        assert!(matches!(
            source.read(&mut buf, Some(Duration::from_millis(5))),
            Err(AcquisitionError::Timeout)
        ));
    }
}
