//! Softphone client core.
//!
//! A [`DeviceController`] owns one voice device built from an access token,
//! reacts to its lifecycle events, keeps microphone and speaker selections,
//! forwards dialpad digits to the live call and renews the token without
//! dropping a call in progress.

pub mod activity_log;
pub mod audio;
pub mod call;
pub mod commands;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod device;
pub mod error;
pub mod renewal;
pub mod view;

pub use activity_log::{ActivityLog, LogEntry};
pub use audio::{MediaBackend, MediaDeviceDescriptor, MediaDeviceRegistry};
pub use call::{CallSession, Digit};
pub use commands::DialpadCommand;
pub use config::SoftphoneConfig;
pub use controller::{ControllerState, DeviceController};
pub use credentials::{AddressBar, CredentialProvider, MemoryAddressBar, Token, TokenOrigin, TokenSource};
pub use device::{Connection, Device, DeviceEvent, DeviceFactory, DeviceOptions};
pub use error::{CredentialError, DeviceError, IncomingCallError, MediaError, TeardownError};
pub use view::{DialpadView, EndpointStatus};
