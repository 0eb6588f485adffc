use thiserror::Error;

/// Failure to obtain an access token from the page address or the token endpoint
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint answered {0}")]
    Status(reqwest::StatusCode),

    #[error("token endpoint returned no token")]
    MissingToken,

    #[error("invalid token endpoint address: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Error raised by the voice SDK, either through an `error` event or a failed call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct DeviceError {
    pub code: u32,
    pub message: String,
}

impl DeviceError {
    /// The access token used to build the device has expired
    pub const TOKEN_EXPIRED: u32 = 31205;
    /// The access token could not be parsed
    pub const INVALID_TOKEN: u32 = 31204;
    /// Generic SDK failure
    pub const GENERIC: u32 = 31000;

    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn token_expired() -> Self {
        Self::new(Self::TOKEN_EXPIRED, "JWT Token Expired")
    }

    pub fn is_token_expired(&self) -> bool {
        self.code == Self::TOKEN_EXPIRED
    }
}

/// Microphone or speaker access failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("requested device not found: {0}")]
    NotFound(String),

    #[error("audio hardware error: {0}")]
    Hardware(String),

    #[error("voice device is not ready")]
    NoDevice,
}

/// Failure while answering an incoming call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncomingCallError {
    #[error("no microphone selected")]
    NoMicrophone,

    #[error("could not bind microphone: {0}")]
    Bind(#[source] MediaError),

    #[error("could not accept call: {0}")]
    Accept(#[source] DeviceError),
}

/// Failure while destroying a stale device during renewal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error destroying device: {0}")]
pub struct TeardownError(#[from] pub DeviceError);

/// A dialpad key that is not a DTMF digit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a DTMF digit")]
pub struct DigitError(pub char);
