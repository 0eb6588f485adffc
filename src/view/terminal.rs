use chrono::Local;

use crate::activity_log::LogEntry;
use crate::audio::MediaDeviceDescriptor;
use crate::commands::DialpadCommand;
use crate::device::simulated::Simulator;
use crate::view::{ControlState, DialpadView, EndpointStatus};

/// Dialpad rendered as lines on stdout
#[derive(Debug)]
pub struct TerminalView {
    controls: ControlState,
}

impl Default for TerminalView {
    fn default() -> Self {
        Self {
            controls: ControlState::for_call(false),
        }
    }
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controls(&self) -> ControlState {
        self.controls
    }
}

fn render_options(label: &str, options: &[MediaDeviceDescriptor], selected: Option<&MediaDeviceDescriptor>) {
    println!("{}:", label);
    for option in options {
        let marker = if Some(option) == selected { "*" } else { " " };
        println!("  {} {:<16} {}", marker, option.id, option.name);
    }
}

impl DialpadView for TerminalView {
    fn set_status(&mut self, status: EndpointStatus) {
        println!("[status] {}", status);
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls = ControlState::for_call(enabled);
        println!("[dialpad] {}", if enabled { "enabled" } else { "disabled" });
    }

    fn show_dtmf(&mut self, digits: &str) {
        println!("[dtmf] {}", digits);
    }

    fn show_microphones(&mut self, options: &[MediaDeviceDescriptor], selected: Option<&MediaDeviceDescriptor>) {
        render_options("Microphones", options, selected);
    }

    fn show_speakers(&mut self, options: &[MediaDeviceDescriptor], selected: Option<&MediaDeviceDescriptor>) {
        render_options("Speakers", options, selected);
    }

    fn append_log(&mut self, entry: &LogEntry) {
        println!("{} > {}", entry.at.with_timezone(&Local).format("%H:%M:%S"), entry.message);
    }
}

/// Far-end and hardware events injected into the simulated SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorCommand {
    Incoming(String),
    Call(String),
    RemoteHangup,
    ExpireToken,
    Offline,
    Ready,
    Plug(MediaDeviceDescriptor),
    Unplug(String),
}

impl SimulatorCommand {
    pub fn apply(&self, simulator: &Simulator) -> bool {
        match self {
            SimulatorCommand::Incoming(from) => simulator.incoming(from).is_some(),
            SimulatorCommand::Call(to) => simulator.place_call(to).is_some(),
            SimulatorCommand::RemoteHangup => simulator.remote_hangup(),
            SimulatorCommand::ExpireToken => simulator.expire_token(),
            SimulatorCommand::Offline => simulator.go_offline(),
            SimulatorCommand::Ready => simulator.go_ready(),
            SimulatorCommand::Plug(descriptor) => simulator.plug_input(descriptor.clone()),
            SimulatorCommand::Unplug(id) => simulator.unplug_input(id),
        }
    }
}

/// One line typed at the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    Dialpad(Vec<DialpadCommand>),
    Simulator(SimulatorCommand),
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
digits   0-9 * #  (several at once: 123#)
hangup            end the call
mic <id>          switch microphone
speaker <id>      switch speaker
!incoming <from>  ring this phone
!call <to>        place a call the far end answers
!remote-hangup    far end hangs up
!expire           expire the access token
!offline | !ready device connectivity
!plug <id> <name> | !unplug <id>
quit";

impl TerminalInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            "" | "help" | "?" => TerminalInput::Help,
            "quit" | "exit" => TerminalInput::Quit,
            "hangup" => TerminalInput::Dialpad(vec![DialpadCommand::Hangup]),
            "mic" if !rest.is_empty() => TerminalInput::Dialpad(vec![DialpadCommand::SelectMicrophone(
                MediaDeviceDescriptor::new(rest, rest),
            )]),
            "speaker" if !rest.is_empty() => TerminalInput::Dialpad(vec![DialpadCommand::SelectSpeaker(
                MediaDeviceDescriptor::new(rest, rest),
            )]),
            "!incoming" => TerminalInput::Simulator(SimulatorCommand::Incoming(or_default(rest, "anonymous"))),
            "!call" if !rest.is_empty() => TerminalInput::Simulator(SimulatorCommand::Call(rest.to_string())),
            "!remote-hangup" => TerminalInput::Simulator(SimulatorCommand::RemoteHangup),
            "!expire" => TerminalInput::Simulator(SimulatorCommand::ExpireToken),
            "!offline" => TerminalInput::Simulator(SimulatorCommand::Offline),
            "!ready" => TerminalInput::Simulator(SimulatorCommand::Ready),
            "!plug" if !rest.is_empty() => {
                let (id, name) = rest.split_once(char::is_whitespace).unwrap_or((rest, rest));
                TerminalInput::Simulator(SimulatorCommand::Plug(MediaDeviceDescriptor::new(id, name.trim())))
            }
            "!unplug" if !rest.is_empty() => TerminalInput::Simulator(SimulatorCommand::Unplug(rest.to_string())),
            _ if rest.is_empty() && head.chars().all(|c| c.is_ascii_digit() || c == '*' || c == '#') => {
                TerminalInput::Dialpad(head.chars().map(DialpadCommand::Digit).collect())
            }
            _ => TerminalInput::Unknown(line.to_string()),
        }
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
