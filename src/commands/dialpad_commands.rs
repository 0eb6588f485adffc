use crate::audio::MediaDeviceDescriptor;

/// Commands sent from the dialpad UI to the device controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialpadCommand {
    /// A digit button was pressed
    Digit(char),

    /// The hangup button was pressed
    Hangup,

    /// A microphone was picked
    SelectMicrophone(MediaDeviceDescriptor),

    /// A speaker was picked
    SelectSpeaker(MediaDeviceDescriptor),
}

impl DialpadCommand {
    /// Whether the command comes from a control that is disabled outside a call
    pub fn is_call_control(&self) -> bool {
        matches!(self, DialpadCommand::Digit(_) | DialpadCommand::Hangup)
    }
}
