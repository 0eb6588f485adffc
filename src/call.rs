use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

use crate::device::Connection;
use crate::error::{DeviceError, DigitError};

/// One dialpad key: `0`-`9`, `*` or `#`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digit(char);

impl Digit {
    pub fn as_char(self) -> char {
        self.0
    }
}

impl TryFrom<char> for Digit {
    type Error = DigitError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '0'..='9' | '*' | '#' => Ok(Digit(c)),
            other => Err(DigitError(other)),
        }
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Digits pressed since the last hangup
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DtmfDisplay(String);

impl DtmfDisplay {
    pub fn push(&mut self, digit: Digit) {
        self.0.push(digit.as_char());
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The single live voice connection
#[derive(Debug, Clone)]
pub struct CallSession {
    connection: Arc<dyn Connection>,
}

impl CallSession {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }

    pub fn id(&self) -> &str {
        self.connection.id()
    }

    pub fn remote_party(&self) -> Option<String> {
        self.connection.parameter("From")
    }

    pub fn is_connection(&self, other: &dyn Connection) -> bool {
        self.connection.id() == other.id()
    }

    /// Transmit one DTMF digit over the connection
    pub async fn send_digit(&self, digit: Digit) -> Result<(), DeviceError> {
        debug!("Sending DTMF {} on {}", digit, self.id());
        self.connection
            .send_digits(&digit.to_string())
            .await
            .inspect_err(|e| warn!("Failed to send DTMF {}: {}", digit, e))
    }
}
