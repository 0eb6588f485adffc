#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Normal,
    Disabled,
}

/// How the dialpad buttons should look for the current call state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub digits_enabled: bool,
    pub hangup_enabled: bool,
    pub style: ButtonStyle,
}

impl ControlState {
    /// Digit and hangup buttons are enabled exactly while a call is live
    pub fn for_call(call_active: bool) -> Self {
        Self {
            digits_enabled: call_active,
            hangup_enabled: call_active,
            style: if call_active { ButtonStyle::Normal } else { ButtonStyle::Disabled },
        }
    }

    pub fn enabled(&self) -> bool {
        self.digits_enabled && self.hangup_enabled
    }

    pub fn get_button_class(&self) -> &'static str {
        match self.style {
            ButtonStyle::Normal => "number-dig",
            ButtonStyle::Disabled => "number-dig disabled",
        }
    }
}
