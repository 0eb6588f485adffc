// Command pattern for dialpad operations
// UI events are turned into commands and sent to the device controller

pub mod dialpad_commands;

pub use dialpad_commands::DialpadCommand;
