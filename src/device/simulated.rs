//! In-process voice SDK.
//!
//! Stands in for the hosted SDK in the terminal softphone and in tests:
//! devices become ready as soon as they are built, calls are driven through
//! [`Simulator`] controls, and every interaction is recorded for inspection.

use async_trait::async_trait;
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::audio::{AudioConstraint, CaptureStream, MediaBackend, MediaDeviceDescriptor};
use crate::credentials::Token;
use crate::device::{Connection, Device, DeviceEvent, DeviceEventSink, DeviceFactory, DeviceOptions};
use crate::error::{DeviceError, MediaError};

/// A device the simulator has built
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub token: String,
    pub options: DeviceOptions,
    pub generation: u64,
    pub destroyed: bool,
}

#[derive(Debug)]
struct SimState {
    inputs: Vec<MediaDeviceDescriptor>,
    outputs: Vec<MediaDeviceDescriptor>,
    devices: Vec<DeviceRecord>,
    sink: Option<DeviceEventSink>,
    active: Option<Arc<SimulatedConnection>>,
    bound_input: Option<String>,
    bound_output: Option<String>,
    input_binds: usize,
    input_unbinds: usize,
    sent_digits: Vec<String>,
    disconnect_all_calls: usize,
    open_tracks: usize,
    probes: Vec<AudioConstraint>,
    deny_microphone: bool,
    fail_destroy: bool,
    fail_accept: bool,
    fail_input_binding: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            inputs: vec![
                MediaDeviceDescriptor::new("default", "Default Microphone"),
                MediaDeviceDescriptor::new("usb-headset", "USB Headset"),
            ],
            outputs: vec![
                MediaDeviceDescriptor::new("default", "Default Speakers"),
                MediaDeviceDescriptor::new("usb-headset", "USB Headset"),
            ],
            devices: Vec::new(),
            sink: None,
            active: None,
            bound_input: None,
            bound_output: None,
            input_binds: 0,
            input_unbinds: 0,
            sent_digits: Vec::new(),
            disconnect_all_calls: 0,
            open_tracks: 0,
            probes: Vec::new(),
            deny_microphone: false,
            fail_destroy: false,
            fail_accept: false,
            fail_input_binding: false,
        }
    }
}

/// Shared handle to the simulated SDK and host audio
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    state: Arc<Mutex<SimState>>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn factory(&self) -> SimulatedDeviceFactory {
        SimulatedDeviceFactory {
            simulator: self.clone(),
        }
    }

    pub fn media(&self) -> SimulatedMedia {
        SimulatedMedia::new(self.clone())
    }

    /// A device whose events go nowhere, for exercising media code directly
    pub fn standalone_device(&self) -> Box<dyn Device> {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        self.factory()
            .create(Token::new("standalone"), DeviceOptions::default(), DeviceEventSink::new(0, tx))
    }

    fn emit(&self, event: DeviceEvent) -> bool {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => sink.emit(event),
            None => {
                debug!("No live simulated device for {}", event.name());
                false
            }
        }
    }

    /// Ring the live device
    pub fn incoming(&self, from: &str) -> Option<Arc<SimulatedConnection>> {
        let connection = Arc::new(SimulatedConnection::new(self.clone(), from));
        if self.emit(DeviceEvent::Incoming(connection.clone())) {
            Some(connection)
        } else {
            None
        }
    }

    /// Originate a call that the far end answers immediately
    pub fn place_call(&self, to: &str) -> Option<Arc<SimulatedConnection>> {
        let connection = Arc::new(SimulatedConnection::new(self.clone(), to));
        if self.lock().sink.is_none() {
            return None;
        }
        self.lock().active = Some(connection.clone());
        self.emit(DeviceEvent::Connect(connection.clone()));
        Some(connection)
    }

    /// The far end hangs up the active call
    pub fn remote_hangup(&self) -> bool {
        let active = self.lock().active.take();
        match active {
            Some(connection) => self.emit(DeviceEvent::Disconnect(connection)),
            None => false,
        }
    }

    pub fn expire_token(&self) -> bool {
        self.emit(DeviceEvent::Error(DeviceError::token_expired()))
    }

    pub fn raise_error(&self, error: DeviceError) -> bool {
        self.emit(DeviceEvent::Error(error))
    }

    pub fn go_offline(&self) -> bool {
        self.emit(DeviceEvent::Offline)
    }

    pub fn go_ready(&self) -> bool {
        self.emit(DeviceEvent::Ready)
    }

    /// Plug in a microphone
    pub fn plug_input(&self, descriptor: MediaDeviceDescriptor) -> bool {
        self.lock().inputs.push(descriptor);
        self.emit(DeviceEvent::MediaDevicesChanged)
    }

    /// Remove a microphone
    pub fn unplug_input(&self, id: &str) -> bool {
        self.lock().inputs.retain(|d| d.id != id);
        self.emit(DeviceEvent::MediaDevicesChanged)
    }

    pub fn set_inputs(&self, inputs: Vec<MediaDeviceDescriptor>) {
        self.lock().inputs = inputs;
    }

    pub fn set_outputs(&self, outputs: Vec<MediaDeviceDescriptor>) {
        self.lock().outputs = outputs;
    }

    pub fn deny_microphone(&self, deny: bool) {
        self.lock().deny_microphone = deny;
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.lock().fail_destroy = fail;
    }

    pub fn fail_accept(&self, fail: bool) {
        self.lock().fail_accept = fail;
    }

    pub fn fail_input_binding(&self, fail: bool) {
        self.lock().fail_input_binding = fail;
    }

    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.lock().devices.clone()
    }

    pub fn created_tokens(&self) -> Vec<String> {
        self.lock().devices.iter().map(|d| d.token.clone()).collect()
    }

    pub fn destroyed_count(&self) -> usize {
        self.lock().devices.iter().filter(|d| d.destroyed).count()
    }

    pub fn active_connection(&self) -> Option<Arc<SimulatedConnection>> {
        self.lock().active.clone()
    }

    pub fn bound_input(&self) -> Option<String> {
        self.lock().bound_input.clone()
    }

    pub fn bound_output(&self) -> Option<String> {
        self.lock().bound_output.clone()
    }

    pub fn input_binds(&self) -> usize {
        self.lock().input_binds
    }

    pub fn input_unbinds(&self) -> usize {
        self.lock().input_unbinds
    }

    pub fn sent_digits(&self) -> Vec<String> {
        self.lock().sent_digits.clone()
    }

    pub fn disconnect_all_calls(&self) -> usize {
        self.lock().disconnect_all_calls
    }

    pub fn open_tracks(&self) -> usize {
        self.lock().open_tracks
    }

    pub fn probes(&self) -> Vec<AudioConstraint> {
        self.lock().probes.clone()
    }
}

/// Connection handed out by the simulator
#[derive(Debug)]
pub struct SimulatedConnection {
    id: String,
    from: String,
    simulator: Simulator,
}

impl SimulatedConnection {
    fn new(simulator: Simulator, from: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.to_string(),
            simulator,
        }
    }
}

#[async_trait]
impl Connection for SimulatedConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn parameter(&self, name: &str) -> Option<String> {
        match name {
            "From" => Some(self.from.clone()),
            "CallSid" => Some(self.id.clone()),
            _ => None,
        }
    }

    async fn accept(&self) -> Result<(), DeviceError> {
        let connection = {
            let mut state = self.simulator.lock();
            if state.fail_accept {
                return Err(DeviceError::new(DeviceError::GENERIC, "Connection could not be accepted"));
            }
            let connection = Arc::new(SimulatedConnection {
                id: self.id.clone(),
                from: self.from.clone(),
                simulator: self.simulator.clone(),
            });
            state.active = Some(connection.clone());
            connection
        };
        info!("Simulated call {} accepted", self.id);
        self.simulator.emit(DeviceEvent::Connect(connection));
        Ok(())
    }

    async fn send_digits(&self, digits: &str) -> Result<(), DeviceError> {
        self.simulator.lock().sent_digits.push(digits.to_string());
        Ok(())
    }
}

pub struct SimulatedDeviceFactory {
    simulator: Simulator,
}

impl DeviceFactory for SimulatedDeviceFactory {
    fn create(&self, token: Token, options: DeviceOptions, events: DeviceEventSink) -> Box<dyn Device> {
        let malformed = token.expose().trim().is_empty();
        let index = {
            let mut state = self.simulator.lock();
            state.devices.push(DeviceRecord {
                token: token.expose().to_string(),
                options,
                generation: events.generation(),
                destroyed: false,
            });
            state.sink = Some(events.clone());
            state.devices.len() - 1
        };

        if malformed {
            events.emit(DeviceEvent::Error(DeviceError::new(
                DeviceError::INVALID_TOKEN,
                "Invalid access token",
            )));
        } else {
            events.emit(DeviceEvent::Ready);
        }

        Box::new(SimulatedDevice {
            simulator: self.simulator.clone(),
            generation: events.generation(),
            index,
        })
    }
}

struct SimulatedDevice {
    simulator: Simulator,
    generation: u64,
    index: usize,
}

#[async_trait]
impl Device for SimulatedDevice {
    async fn disconnect_all(&self) {
        let active = {
            let mut state = self.simulator.lock();
            state.disconnect_all_calls += 1;
            state.active.take()
        };
        if let Some(connection) = active {
            self.simulator.emit(DeviceEvent::Disconnect(connection));
        }
    }

    async fn destroy(&self) -> Result<(), DeviceError> {
        let mut state = self.simulator.lock();
        if state.fail_destroy {
            return Err(DeviceError::new(DeviceError::GENERIC, "Device already destroyed"));
        }
        if let Some(record) = state.devices.get_mut(self.index) {
            record.destroyed = true;
        }
        if state.sink.as_ref().map(|s| s.generation()) == Some(self.generation) {
            state.sink = None;
        }
        Ok(())
    }

    async fn available_input_devices(&self) -> Vec<MediaDeviceDescriptor> {
        self.simulator.lock().inputs.clone()
    }

    async fn available_output_devices(&self) -> Vec<MediaDeviceDescriptor> {
        self.simulator.lock().outputs.clone()
    }

    async fn set_input_device(&self, device_id: &str) -> Result<(), MediaError> {
        let mut state = self.simulator.lock();
        if state.fail_input_binding {
            return Err(MediaError::Hardware(format!("{} is busy", device_id)));
        }
        if !state.inputs.iter().any(|d| d.id == device_id) {
            return Err(MediaError::NotFound(device_id.to_string()));
        }
        state.bound_input = Some(device_id.to_string());
        state.input_binds += 1;
        Ok(())
    }

    async fn unset_input_device(&self) -> Result<(), MediaError> {
        let mut state = self.simulator.lock();
        state.bound_input = None;
        state.input_unbinds += 1;
        Ok(())
    }

    async fn set_output_device(&self, device_id: &str) -> Result<(), MediaError> {
        let mut state = self.simulator.lock();
        if !state.outputs.iter().any(|d| d.id == device_id) {
            return Err(MediaError::NotFound(device_id.to_string()));
        }
        state.bound_output = Some(device_id.to_string());
        Ok(())
    }
}

/// Host microphone access backed by the simulator's hardware list
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    simulator: Simulator,
}

impl SimulatedMedia {
    pub fn new(simulator: Simulator) -> Self {
        Self { simulator }
    }
}

#[async_trait]
impl MediaBackend for SimulatedMedia {
    async fn acquire_audio(&self, constraint: AudioConstraint) -> Result<Box<dyn CaptureStream>, MediaError> {
        let mut state = self.simulator.lock();
        state.probes.push(constraint.clone());
        if state.deny_microphone {
            return Err(MediaError::PermissionDenied("Permission denied".into()));
        }
        match &constraint {
            AudioConstraint::Any if state.inputs.is_empty() => {
                return Err(MediaError::NotFound("no microphone connected".into()));
            }
            AudioConstraint::Device(id) if !state.inputs.iter().any(|d| &d.id == id) => {
                return Err(MediaError::NotFound(id.clone()));
            }
            _ => {}
        }
        state.open_tracks += 1;
        Ok(Box::new(SimulatedStream {
            simulator: self.simulator.clone(),
        }))
    }
}

struct SimulatedStream {
    simulator: Simulator,
}

impl CaptureStream for SimulatedStream {
    fn track_count(&self) -> usize {
        1
    }

    fn stop_all(self: Box<Self>) {
        let mut state = self.simulator.lock();
        state.open_tracks = state.open_tracks.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn new_device_reports_ready() {
        let simulator = Simulator::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _device = simulator
            .factory()
            .create(Token::new("abc"), DeviceOptions::default(), DeviceEventSink::new(1, tx));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, DeviceEvent::Ready));
        assert_eq!(simulator.created_tokens(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn blank_token_reports_error() {
        let simulator = Simulator::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _device = simulator
            .factory()
            .create(Token::new(" "), DeviceOptions::default(), DeviceEventSink::new(1, tx));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, DeviceEvent::Error(e) if e.code == DeviceError::INVALID_TOKEN));
    }

    #[tokio::test]
    async fn destroyed_device_stops_receiving_injected_events() {
        let simulator = Simulator::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let device = simulator
            .factory()
            .create(Token::new("abc"), DeviceOptions::default(), DeviceEventSink::new(1, tx));

        device.destroy().await.unwrap();

        assert_eq!(simulator.destroyed_count(), 1);
        assert!(simulator.incoming("+15550100").is_none());
    }

    #[tokio::test]
    async fn probe_streams_are_counted_until_stopped() {
        let simulator = Simulator::new();
        let media = simulator.media();

        let stream = media.acquire_audio(AudioConstraint::Any).await.unwrap();
        assert_eq!(simulator.open_tracks(), 1);
        stream.stop_all();
        assert_eq!(simulator.open_tracks(), 0);
    }
}
