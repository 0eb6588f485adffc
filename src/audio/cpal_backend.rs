//! Host microphone access through CPAL

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use log::debug;

use crate::audio::{AudioConstraint, CaptureStream, MediaBackend, MediaDeviceDescriptor};
use crate::error::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDirection {
    Input,
    Output,
}

/// List host audio devices; CPAL has no stable ids, so the name doubles as id
pub fn list_cpal_devices(direction: AudioDirection) -> Result<Vec<MediaDeviceDescriptor>, MediaError> {
    let host = cpal::default_host();
    let devices: Box<dyn Iterator<Item = cpal::Device>> = match direction {
        AudioDirection::Input => Box::new(host.input_devices().map_err(|e| MediaError::Hardware(e.to_string()))?),
        AudioDirection::Output => Box::new(host.output_devices().map_err(|e| MediaError::Hardware(e.to_string()))?),
    };

    Ok(devices
        .map(|device| {
            let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
            MediaDeviceDescriptor::new(name.clone(), name)
        })
        .collect())
}

/// Probes microphones by opening their default input configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalMediaBackend;

impl CpalMediaBackend {
    pub fn new() -> Self {
        Self
    }
}

fn probe_input(constraint: AudioConstraint) -> Result<CpalProbe, MediaError> {
    let host = cpal::default_host();
    let device = match &constraint {
        AudioConstraint::Any => host
            .default_input_device()
            .ok_or_else(|| MediaError::NotFound("no default microphone".into()))?,
        AudioConstraint::Device(id) => host
            .input_devices()
            .map_err(|e| MediaError::Hardware(e.to_string()))?
            .find(|d| d.name().map(|n| &n == id).unwrap_or(false))
            .ok_or_else(|| MediaError::NotFound(id.clone()))?,
    };

    let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
    let config = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => MediaError::NotFound(name.clone()),
        other => MediaError::Hardware(other.to_string()),
    })?;

    debug!(
        "Probed {} at {} Hz, {} channel(s)",
        name,
        config.sample_rate().0,
        config.channels()
    );
    Ok(CpalProbe {
        name,
        channels: config.channels() as usize,
    })
}

#[async_trait]
impl MediaBackend for CpalMediaBackend {
    async fn acquire_audio(&self, constraint: AudioConstraint) -> Result<Box<dyn CaptureStream>, MediaError> {
        let probe = tokio::task::spawn_blocking(move || probe_input(constraint))
            .await
            .map_err(|e| MediaError::Hardware(e.to_string()))??;
        Ok(Box::new(probe))
    }
}

struct CpalProbe {
    name: String,
    channels: usize,
}

impl CaptureStream for CpalProbe {
    fn track_count(&self) -> usize {
        self.channels
    }

    fn stop_all(self: Box<Self>) {
        debug!("Released probe of {}", self.name);
    }
}
