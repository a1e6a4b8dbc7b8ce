//! Audio subsystem module

pub mod buffer;
pub mod source;
#[cfg(feature = "cpal")]
pub mod capture;
#[cfg(feature = "cpal")]
pub mod device;

pub use buffer::{handoff_queue, BlockConsumer, BlockProducer, QueueSizing, SampleBlock};
pub use source::{AcquisitionSource, SampleEncoding, ToneSource};
#[cfg(feature = "cpal")]
pub use capture::DeviceSource;
#[cfg(feature = "cpal")]
pub use device::{find_input_device, list_input_devices, InputDeviceInfo};

use crate::config::{AcquisitionConfig, SourceKind};
use crate::error::AcquisitionError;

/// Build the source selected in the configuration
pub fn open_source(config: &AcquisitionConfig) -> Result<Box<dyn AcquisitionSource>, AcquisitionError> {
    match config.source {
        SourceKind::Tone => Ok(Box::new(ToneSource::from_config(config)?)),
        #[cfg(feature = "cpal")]
        SourceKind::Device => Ok(Box::new(DeviceSource::from_config(config)?)),
        #[cfg(not(feature = "cpal"))]
        SourceKind::Device => Err(AcquisitionError::DeviceNotFound(
            "built without the `cpal` feature".to_string(),
        )),
    }
}
