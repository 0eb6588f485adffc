//! The dialpad UI as seen from the controller.

use std::fmt;

use crate::activity_log::LogEntry;
use crate::audio::MediaDeviceDescriptor;

pub mod control_state;
pub mod terminal;

pub use control_state::{ButtonStyle, ControlState};
pub use terminal::TerminalView;

/// Endpoint status shown in the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Online,
    Offline,
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointStatus::Online => f.write_str("Online"),
            EndpointStatus::Offline => f.write_str("Offline"),
        }
    }
}

/// Rendering surface driven by the device controller
pub trait DialpadView: Send {
    fn set_status(&mut self, status: EndpointStatus);

    /// Enable or disable the digit and hangup buttons
    fn set_controls_enabled(&mut self, enabled: bool);

    fn show_dtmf(&mut self, digits: &str);

    fn show_microphones(&mut self, options: &[MediaDeviceDescriptor], selected: Option<&MediaDeviceDescriptor>);

    fn show_speakers(&mut self, options: &[MediaDeviceDescriptor], selected: Option<&MediaDeviceDescriptor>);

    /// A new activity entry was appended
    fn append_log(&mut self, entry: &LogEntry);
}
