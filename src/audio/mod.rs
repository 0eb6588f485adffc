use async_trait::async_trait;
use std::fmt;

use crate::error::MediaError;

pub mod device_manager;
#[cfg(feature = "device-cpal")]
pub mod cpal_backend;

pub use device_manager::MediaDeviceRegistry;
#[cfg(feature = "device-cpal")]
pub use cpal_backend::CpalMediaBackend;

/// Identifier and label of a selectable microphone or speaker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaDeviceDescriptor {
    pub id: String,
    pub name: String,
}

impl MediaDeviceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MediaDeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Which microphone a capture request targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioConstraint {
    /// Any microphone; used to unlock hardware labels
    Any,
    /// One specific microphone
    Device(String),
}

/// Capture stream obtained from the host; held only long enough to prove access
pub trait CaptureStream: Send {
    fn track_count(&self) -> usize;

    /// Stop every track in the stream
    fn stop_all(self: Box<Self>);
}

/// Host microphone access (the permission-gated capture API)
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn acquire_audio(&self, constraint: AudioConstraint) -> Result<Box<dyn CaptureStream>, MediaError>;
}
