//! Boundary to the voice SDK.
//!
//! The SDK is an opaque capability provider: a [`DeviceFactory`] turns an
//! access token into a [`Device`], and the device reports its lifecycle
//! through [`DeviceEvent`]s pushed into a [`DeviceEventSink`]. Calls are
//! represented by [`Connection`] objects handed out in those events.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio::MediaDeviceDescriptor;
use crate::credentials::Token;
use crate::error::{DeviceError, MediaError};

pub mod simulated;

/// Audio codecs the device may negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Opus,
    Pcmu,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Opus => f.write_str("opus"),
            Codec::Pcmu => f.write_str("pcmu"),
        }
    }
}

/// Options passed to the SDK when a device is constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Preferred codecs, highest quality first
    pub codec_preferences: Vec<Codec>,
    /// Synthesize DTMF tones locally so the microphone does not pick them up
    /// and transmit them a second time
    pub fake_local_dtmf: bool,
    /// Report the `ringing` state for outgoing calls
    pub enable_ringing_state: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            codec_preferences: vec![Codec::Opus, Codec::Pcmu],
            fake_local_dtmf: true,
            enable_ringing_state: true,
        }
    }
}

impl DeviceOptions {
    pub fn with_codec_preferences(mut self, codecs: Vec<Codec>) -> Self {
        self.codec_preferences = codecs;
        self
    }
}

/// One voice connection handed out by the SDK
#[async_trait]
pub trait Connection: fmt::Debug + Send + Sync {
    /// SDK identifier of this connection
    fn id(&self) -> &str;

    /// Value of a connection parameter such as `From`
    fn parameter(&self, name: &str) -> Option<String>;

    /// Answer an incoming connection
    async fn accept(&self) -> Result<(), DeviceError>;

    /// Send DTMF digits over the connection
    async fn send_digits(&self, digits: &str) -> Result<(), DeviceError>;
}

/// Local voice endpoint built from one access token
#[async_trait]
pub trait Device: Send + Sync {
    /// Hang up every connection on this device
    async fn disconnect_all(&self);

    /// Unregister and release the device
    async fn destroy(&self) -> Result<(), DeviceError>;

    /// Microphones the SDK can route into a call
    async fn available_input_devices(&self) -> Vec<MediaDeviceDescriptor>;

    /// Speakers the SDK can route call audio to
    async fn available_output_devices(&self) -> Vec<MediaDeviceDescriptor>;

    /// Bind the microphone used for calls
    async fn set_input_device(&self, device_id: &str) -> Result<(), MediaError>;

    /// Release the bound microphone
    async fn unset_input_device(&self) -> Result<(), MediaError>;

    /// Route call audio to a speaker
    async fn set_output_device(&self, device_id: &str) -> Result<(), MediaError>;
}

/// Builds devices from access tokens
pub trait DeviceFactory: Send + Sync {
    /// Construct a device. Construction problems such as a malformed token
    /// are reported through an `error` event, not returned here.
    fn create(&self, token: Token, options: DeviceOptions, events: DeviceEventSink) -> Box<dyn Device>;
}

/// Lifecycle events raised by a device
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Ready,
    Offline,
    Error(DeviceError),
    Connect(Arc<dyn Connection>),
    Disconnect(Arc<dyn Connection>),
    Incoming(Arc<dyn Connection>),
    /// Audio hardware was plugged in or removed
    MediaDevicesChanged,
}

impl DeviceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceEvent::Ready => "ready",
            DeviceEvent::Offline => "offline",
            DeviceEvent::Error(_) => "error",
            DeviceEvent::Connect(_) => "connect",
            DeviceEvent::Disconnect(_) => "disconnect",
            DeviceEvent::Incoming(_) => "incoming",
            DeviceEvent::MediaDevicesChanged => "deviceChange",
        }
    }
}

/// Device event tagged with the generation of the device that raised it
#[derive(Debug, Clone)]
pub struct GenerationEvent {
    pub generation: u64,
    pub event: DeviceEvent,
}

/// Channel end a device uses to report its events
#[derive(Debug, Clone)]
pub struct DeviceEventSink {
    generation: u64,
    sender: mpsc::UnboundedSender<GenerationEvent>,
}

impl DeviceEventSink {
    pub fn new(generation: u64, sender: mpsc::UnboundedSender<GenerationEvent>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event; returns false once the controller is gone
    pub fn emit(&self, event: DeviceEvent) -> bool {
        let name = event.name();
        if let Err(e) = self.sender.send(GenerationEvent {
            generation: self.generation,
            event,
        }) {
            log::debug!("Dropping device event {}: {}", name, e);
            return false;
        }
        true
    }
}
