//! Application configuration
//!
//! Loaded from a TOML file; every field has a default so partial files are
//! accepted. The collector address is parsed once here and never re-resolved.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "STREAMER_CONFIG";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
}

/// Which acquisition source feeds the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic sine tone, paced in real time
    Tone,
    /// Host input device (requires the `cpal` feature)
    Device,
}

/// Peripheral presets carried over from the firmware build options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// Standard I2S microphone: 22050 Hz, 32-bit slots, mono
    Standard,
    /// PDM microphone: 44100 Hz, 16-bit, mono
    Pdm,
}

impl AcquisitionMode {
    pub fn sample_rate(&self) -> u32 {
        match self {
            AcquisitionMode::Standard => DEFAULT_SAMPLE_RATE,
            AcquisitionMode::Pdm => PDM_SAMPLE_RATE,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self {
            AcquisitionMode::Standard => 32,
            AcquisitionMode::Pdm => 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "defaults::source")]
    pub source: SourceKind,

    #[serde(default = "defaults::mode")]
    pub mode: AcquisitionMode,

    /// Overrides the mode's sample rate
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// Overrides the mode's bit depth (16, 24 or 32)
    #[serde(default)]
    pub bits_per_sample: Option<u16>,

    #[serde(default = "defaults::channels")]
    pub channels: u16,

    #[serde(default = "defaults::block_size")]
    pub block_size: usize,

    /// Input device name; `None` selects the default input
    #[serde(default)]
    pub device: Option<String>,

    /// Frequency of the synthetic tone source
    #[serde(default = "defaults::tone_hz")]
    pub tone_hz: f32,
}

impl AcquisitionConfig {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or_else(|| self.mode.sample_rate())
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or_else(|| self.mode.bits_per_sample())
    }

    /// Bytes occupied by one sample on the wire (24-bit sits in a 32-bit slot)
    pub fn bytes_per_sample(&self) -> usize {
        match self.bits_per_sample() {
            16 => 2,
            _ => 4,
        }
    }

    /// Bytes per interleaved frame (one sample for every channel)
    pub fn frame_bytes(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Capture time covered by one block
    pub fn block_period(&self) -> Duration {
        let bytes_per_sec = self.sample_rate() as u64 * self.frame_bytes() as u64;
        if bytes_per_sec == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.block_size as u64 * 1_000_000_000 / bytes_per_sec)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            source: defaults::source(),
            mode: defaults::mode(),
            sample_rate: None,
            bits_per_sample: None,
            channels: defaults::channels(),
            block_size: defaults::block_size(),
            device: None,
            tone_hz: defaults::tone_hz(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "defaults::queue_capacity")]
    pub capacity: usize,

    /// How long the producer may wait for room before dropping; 0 drops at once
    #[serde(default)]
    pub enqueue_wait_ms: u64,
}

impl QueueConfig {
    pub fn enqueue_wait(&self) -> Duration {
        Duration::from_millis(self.enqueue_wait_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::queue_capacity(),
            enqueue_wait_ms: 0,
        }
    }
}

/// What the transmission loop does when a session cannot be created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Keep trying, waiting `reconnect_delay_ms` between attempts
    Retry,
    /// End the transmission loop
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "defaults::destination")]
    pub destination: SocketAddrV4,

    #[serde(default = "defaults::reconnect")]
    pub reconnect: ReconnectPolicy,

    #[serde(default = "defaults::reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Worst-case session bring-up time, used to check queue sizing
    #[serde(default = "defaults::expected_reconnect_ms")]
    pub expected_reconnect_ms: u64,

    /// SO_SNDBUF override for new sockets
    #[serde(default)]
    pub send_buffer_bytes: Option<usize>,

    /// Record datagrams in memory instead of touching the network
    #[serde(default)]
    pub dry_run: bool,
}

impl NetworkConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn expected_reconnect(&self) -> Duration {
        Duration::from_millis(self.expected_reconnect_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            destination: defaults::destination(),
            reconnect: defaults::reconnect(),
            reconnect_delay_ms: defaults::reconnect_delay_ms(),
            expected_reconnect_ms: defaults::expected_reconnect_ms(),
            send_buffer_bytes: None,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// CPU core for the acquisition thread
    #[serde(default = "defaults::acquisition_core")]
    pub acquisition_core: Option<usize>,

    /// CPU core for the transmission thread
    #[serde(default = "defaults::transmission_core")]
    pub transmission_core: Option<usize>,

    #[serde(default = "defaults::idle_wait_us")]
    pub idle_wait_us: u64,

    #[serde(default = "defaults::stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl TaskConfig {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_micros(self.idle_wait_us)
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            acquisition_core: defaults::acquisition_core(),
            transmission_core: defaults::transmission_core(),
            idle_wait_us: defaults::idle_wait_us(),
            stats_interval_secs: defaults::stats_interval_secs(),
        }
    }
}

mod defaults {
    use super::{AcquisitionMode, ReconnectPolicy, SourceKind};
    use crate::constants::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    pub fn source() -> SourceKind { SourceKind::Tone }
    pub fn mode() -> AcquisitionMode { AcquisitionMode::Standard }
    pub fn channels() -> u16 { DEFAULT_CHANNELS }
    pub fn block_size() -> usize { DEFAULT_BLOCK_SIZE }
    pub fn tone_hz() -> f32 { 440.0 }

    pub fn queue_capacity() -> usize { DEFAULT_QUEUE_CAPACITY }

    pub fn destination() -> SocketAddrV4 { SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_UDP_PORT) }
    pub fn reconnect() -> ReconnectPolicy { ReconnectPolicy::Retry }
    pub fn reconnect_delay_ms() -> u64 { DEFAULT_RECONNECT_DELAY_MS }
    pub fn expected_reconnect_ms() -> u64 { DEFAULT_EXPECTED_RECONNECT_MS }

    pub fn acquisition_core() -> Option<usize> { Some(ACQUISITION_CORE) }
    pub fn transmission_core() -> Option<usize> { Some(TRANSMISSION_CORE) }
    pub fn idle_wait_us() -> u64 { DEFAULT_IDLE_WAIT_US }
    pub fn stats_interval_secs() -> u64 { DEFAULT_STATS_INTERVAL_SECS }
}

impl AppConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolve the configuration: explicit path, then `STREAMER_CONFIG`,
    /// then the platform config directory, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                tracing::debug!("Using config file {}", path.display());
                return Self::from_file(&path);
            }
        }

        let config = AppConfig::default();
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let acq = &self.acquisition;

        if acq.sample_rate() == 0 {
            return Err(Error::Config("sample_rate must be non-zero".into()));
        }
        if acq.channels == 0 {
            return Err(Error::Config("channels must be non-zero".into()));
        }
        if !matches!(acq.bits_per_sample(), 16 | 24 | 32) {
            return Err(Error::Config(format!(
                "unsupported bits_per_sample: {}",
                acq.bits_per_sample()
            )));
        }
        if acq.block_size == 0 {
            return Err(Error::Config("block_size must be non-zero".into()));
        }
        if acq.block_size % acq.frame_bytes() != 0 {
            return Err(Error::Config(format!(
                "block_size {} is not a multiple of the {}-byte frame",
                acq.block_size,
                acq.frame_bytes()
            )));
        }
        if acq.block_size > MAX_DATAGRAM_PAYLOAD {
            return Err(Error::Config(format!(
                "block_size {} exceeds the UDP payload limit of {}",
                acq.block_size, MAX_DATAGRAM_PAYLOAD
            )));
        }

        if self.queue.capacity == 0 {
            return Err(Error::Config("queue capacity must be non-zero".into()));
        }

        if self.network.destination.ip() == &Ipv4Addr::UNSPECIFIED
            || self.network.destination.port() == 0
        {
            return Err(Error::Config(format!(
                "invalid destination {}",
                self.network.destination
            )));
        }

        if let (Some(a), Some(t)) = (self.tasks.acquisition_core, self.tasks.transmission_core) {
            if a == t {
                return Err(Error::Config(format!(
                    "acquisition and transmission must run on distinct cores (both {})",
                    a
                )));
            }
        }

        Ok(())
    }
}

/// `config.toml` inside the platform configuration directory
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "udp-audio-streamer")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.acquisition.sample_rate(), 22050);
        assert_eq!(config.acquisition.bits_per_sample(), 32);
        assert_eq!(config.acquisition.frame_bytes(), 4);
        assert_eq!(config.queue.enqueue_wait(), Duration::ZERO);
        assert_eq!(config.network.reconnect, ReconnectPolicy::Retry);
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [acquisition]
            mode = "pdm"

            [network]
            destination = "192.168.4.2:5005"
            reconnect = "abort"
            "#,
        )
        .unwrap();

        assert_eq!(config.acquisition.sample_rate(), 44100);
        assert_eq!(config.acquisition.frame_bytes(), 2);
        assert_eq!(config.network.destination, "192.168.4.2:5005".parse::<SocketAddrV4>().unwrap());
        assert_eq!(config.network.reconnect, ReconnectPolicy::Abort);
        assert_eq!(config.queue.capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.acquisition.block_size = 4098;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.acquisition.block_size = 70_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.acquisition.bits_per_sample = Some(12);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tasks.acquisition_core = Some(1);
        config.tasks.transmission_core = Some(1);
        assert!(config.validate().is_err());

        assert!(AppConfig::from_toml_str("[network]\ndestination = \"nonsense\"").is_err());
    }

    #[test]
    fn test_block_period() {
        let mut acq = AcquisitionConfig::default();
        acq.mode = AcquisitionMode::Pdm;
        acq.block_size = 8820;
        // 44100 Hz * 2 bytes = 88200 B/s, so 8820 bytes is 100 ms
        assert_eq!(acq.block_period(), Duration::from_millis(100));
    }

    fn write_temp_config(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("streamer-{}-{}.toml", std::process::id(), name));
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_defaults_pin_distinct_cores() {
        let tasks = TaskConfig::default();
        assert_eq!(tasks.acquisition_core, Some(1));
        assert_eq!(tasks.transmission_core, Some(0));

        let config = AppConfig::from_toml_str("[tasks]\nidle_wait_us = 50").unwrap();
        assert_eq!(config.tasks.acquisition_core, Some(1));
        assert_eq!(config.tasks.transmission_core, Some(0));
    }

    #[test]
    fn test_load_explicit_file() {
        let path = write_temp_config("explicit", "[queue]\ncapacity = 32\n");
        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.queue.capacity, 32);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = write_temp_config("invalid", "[acquisition]\nblock_size = 4098\n");
        let result = AppConfig::from_file(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = std::env::temp_dir().join("streamer-does-not-exist.toml");
        assert!(matches!(AppConfig::load(Some(&path)), Err(Error::Io(_))));
    }

    // Every case touching the environment variable lives here so parallel
    // tests never observe it.
    #[test]
    fn test_load_lookup_order() {
        let from_env = write_temp_config("env", "[queue]\ncapacity = 8\n");
        let explicit = write_temp_config("precedence", "[queue]\ncapacity = 24\n");
        let invalid = write_temp_config("env-invalid", "[queue]\ncapacity = 0\n");

        std::env::set_var(CONFIG_ENV_VAR, &from_env);
        let env_config = AppConfig::load(None);
        let explicit_config = AppConfig::load(Some(&explicit));

        std::env::set_var(CONFIG_ENV_VAR, &invalid);
        let invalid_config = AppConfig::load(None);

        std::env::remove_var(CONFIG_ENV_VAR);
        for path in [&from_env, &explicit, &invalid] {
            std::fs::remove_file(path).ok();
        }

        assert_eq!(env_config.unwrap().queue.capacity, 8);
        assert_eq!(explicit_config.unwrap().queue.capacity, 24);
        assert!(matches!(invalid_config, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip_keeps_destination() {
        let mut config = AppConfig::default();
        config.network.destination = "10.0.0.7:4000".parse().unwrap();
        let text = config.to_toml_string().unwrap();
        let parsed = AppConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.network.destination, config.network.destination);
    }
}
