//! Device controller: the softphone's lifecycle state machine.
//!
//! The controller exclusively owns the voice device, the single call
//! session and the media selections. Device events, dialpad commands and
//! the renewal poll are handled one at a time from a single loop, so no
//! handler ever observes another one half-way through.

use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::activity_log::ActivityLog;
use crate::audio::{MediaBackend, MediaDeviceDescriptor, MediaDeviceRegistry};
use crate::call::{CallSession, Digit, DtmfDisplay};
use crate::commands::DialpadCommand;
use crate::config::SoftphoneConfig;
use crate::credentials::{Token, TokenOrigin, TokenSource};
use crate::device::{Connection, Device, DeviceEvent, DeviceEventSink, DeviceFactory, DeviceOptions, GenerationEvent};
use crate::error::{DeviceError, IncomingCallError, MediaError, TeardownError};
use crate::renewal::PollTask;
use crate::view::{DialpadView, EndpointStatus};

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No device has been built yet, or the last one was torn down
    Uninitialized,
    /// Device built, waiting for `ready`
    Initializing,
    Online,
    InCall,
    Offline,
    /// No token could be obtained
    Errored,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceStatus {
    Uninitialized,
    Initializing,
    Online,
    Offline,
    Errored,
}

enum Step {
    Device(GenerationEvent),
    Command(DialpadCommand),
    RenewalTick,
    Shutdown,
}

pub struct DeviceController {
    factory: Box<dyn DeviceFactory>,
    tokens: Box<dyn TokenSource>,
    media: Box<dyn MediaBackend>,
    view: Box<dyn DialpadView>,
    options: DeviceOptions,
    device: Option<Box<dyn Device>>,
    generation: u64,
    status: DeviceStatus,
    call: Option<CallSession>,
    registry: MediaDeviceRegistry,
    dtmf: DtmfDisplay,
    activity: ActivityLog,
    renewal: PollTask,
    renewals_completed: usize,
    watching_media: bool,
    controls_enabled: bool,
    events_tx: mpsc::UnboundedSender<GenerationEvent>,
    events_rx: mpsc::UnboundedReceiver<GenerationEvent>,
}

impl DeviceController {
    pub fn new(
        config: &SoftphoneConfig,
        factory: Box<dyn DeviceFactory>,
        tokens: Box<dyn TokenSource>,
        media: Box<dyn MediaBackend>,
        view: Box<dyn DialpadView>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            factory,
            tokens,
            media,
            view,
            options: DeviceOptions::default().with_codec_preferences(config.codec_preferences.clone()),
            device: None,
            generation: 0,
            status: DeviceStatus::Uninitialized,
            call: None,
            registry: MediaDeviceRegistry::new(),
            dtmf: DtmfDisplay::default(),
            activity: ActivityLog::new(config.max_log_entries),
            renewal: PollTask::new(config.renewal_poll_interval),
            renewals_completed: 0,
            watching_media: false,
            controls_enabled: false,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> ControllerState {
        match self.status {
            DeviceStatus::Errored => ControllerState::Errored,
            DeviceStatus::Uninitialized => ControllerState::Uninitialized,
            DeviceStatus::Offline => ControllerState::Offline,
            _ if self.call.is_some() => ControllerState::InCall,
            DeviceStatus::Initializing => ControllerState::Initializing,
            DeviceStatus::Online => ControllerState::Online,
        }
    }

    pub fn has_active_call(&self) -> bool {
        self.call.is_some()
    }

    pub fn call(&self) -> Option<&CallSession> {
        self.call.as_ref()
    }

    pub fn is_renewing(&self) -> bool {
        self.renewal.is_active()
    }

    pub fn renewals_completed(&self) -> usize {
        self.renewals_completed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn media(&self) -> &MediaDeviceRegistry {
        &self.registry
    }

    pub fn dtmf(&self) -> &str {
        self.dtmf.as_str()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Acquire the first token and build the device.
    pub async fn start(&mut self) {
        if self.device.is_some() {
            debug!("Controller already started");
            return;
        }
        info!("Starting device controller");
        self.acquire_and_initialize().await;
    }

    /// Drive the controller until the command channel closes.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<DialpadCommand>) {
        self.start().await;

        loop {
            let step = tokio::select! {
                biased;
                Some(event) = self.events_rx.recv() => Step::Device(event),
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Shutdown,
                },
                _ = self.renewal.tick() => Step::RenewalTick,
            };

            match step {
                Step::Device(event) => self.handle_event(event).await,
                Step::Command(command) => self.handle_command(command).await,
                Step::RenewalTick => self.poll_renewal().await,
                Step::Shutdown => break,
            }
        }

        self.teardown().await;
    }

    /// Handle every device event queued so far, including events raised
    /// while handling them. Returns how many were handled.
    pub async fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Destroy the device and stop any pending renewal.
    pub async fn teardown(&mut self) {
        self.renewal.cancel();
        self.call = None;
        self.watching_media = false;
        if let Some(device) = self.device.take() {
            info!("Tearing down device generation {}", self.generation);
            if let Err(e) = device.destroy().await {
                warn!("{}", TeardownError::from(e));
            }
        }
        self.status = DeviceStatus::Uninitialized;
        if self.controls_enabled {
            self.set_controls(false);
        }
    }

    async fn acquire_and_initialize(&mut self) {
        let result = self.tokens.token().await;
        match result {
            Ok((token, origin)) => {
                if origin == TokenOrigin::Endpoint {
                    self.log("Got a token");
                }
                self.initialize(token);
            }
            Err(e) => {
                error!("Token acquisition failed: {}", e);
                self.log("Could not get a token from server");
                self.status = DeviceStatus::Errored;
            }
        }
    }

    /// Build a new device from `token`. Any earlier device must already be gone.
    fn initialize(&mut self, token: Token) {
        debug_assert!(self.device.is_none(), "a previous device is still live");
        self.generation += 1;
        self.watching_media = false;
        self.status = DeviceStatus::Initializing;
        info!(
            "Initializing device generation {} (codecs: {:?})",
            self.generation, self.options.codec_preferences
        );

        let sink = DeviceEventSink::new(self.generation, self.events_tx.clone());
        self.device = Some(self.factory.create(token, self.options.clone(), sink));
        self.set_controls(false);
    }

    pub async fn handle_event(&mut self, event: GenerationEvent) {
        if event.generation != self.generation || self.device.is_none() {
            debug!(
                "Dropping {} from stale device generation {} (current {})",
                event.event.name(),
                event.generation,
                self.generation
            );
            return;
        }

        debug!("Device event: {}", event.event.name());
        match event.event {
            DeviceEvent::Ready => self.on_ready().await,
            DeviceEvent::Offline => self.on_offline(),
            DeviceEvent::Error(error) => self.on_error(error),
            DeviceEvent::Connect(connection) => self.on_connect(connection),
            DeviceEvent::Disconnect(connection) => self.on_disconnect(connection).await,
            DeviceEvent::Incoming(connection) => self.on_incoming(connection).await,
            DeviceEvent::MediaDevicesChanged => {
                if self.watching_media {
                    self.refresh_media().await;
                } else {
                    debug!("Ignoring hardware change before ready");
                }
            }
        }
    }

    async fn on_ready(&mut self) {
        self.log("Device Ready");
        self.status = DeviceStatus::Online;
        self.view.set_status(EndpointStatus::Online);
        self.watching_media = true;
        self.refresh_media().await;
    }

    fn on_offline(&mut self) {
        self.log("Device Offline");
        self.status = DeviceStatus::Offline;
        self.view.set_status(EndpointStatus::Offline);
        self.set_controls(false);
    }

    fn on_error(&mut self, error: DeviceError) {
        error!("Device error: {}", error);
        self.log(format!("Device Error: {}", error.message));
        if error.is_token_expired() {
            self.begin_renewal();
        }
    }

    fn on_connect(&mut self, connection: Arc<dyn Connection>) {
        if let Some(call) = &self.call {
            warn!(
                "Ignoring connect for {}: call {} is already active",
                connection.id(),
                call.id()
            );
            return;
        }
        self.call = Some(CallSession::new(connection));
        self.set_controls(true);
        self.log("Successfully established call!");
    }

    async fn on_disconnect(&mut self, connection: Arc<dyn Connection>) {
        match &self.call {
            Some(call) if call.is_connection(connection.as_ref()) => {}
            Some(call) => {
                debug!("Ignoring disconnect for {} while {} is active", connection.id(), call.id());
                return;
            }
            None => {
                debug!("Ignoring disconnect for {}: no active call", connection.id());
                return;
            }
        }

        if let Some(device) = self.device.as_deref() {
            if let Err(e) = device.unset_input_device().await {
                warn!("Failed to release input device: {}", e);
            }
        }
        self.call = None;
        self.set_controls(false);
        self.log("Call ended.");
    }

    async fn on_incoming(&mut self, connection: Arc<dyn Connection>) {
        let from = connection.parameter("From").unwrap_or_else(|| "unknown".into());
        self.log(format!("Incoming call from {}", from));

        if let Some(call) = &self.call {
            info!("Leaving {} unanswered: call {} is active", connection.id(), call.id());
            self.log(format!("Ignoring call from {}, another call is active", from));
            return;
        }

        if let Err(e) = self.answer(connection.as_ref()).await {
            error!("Error accepting connection: {}", e);
            self.log(format!("Error answering call. {}", e));
        }
    }

    async fn answer(&self, connection: &dyn Connection) -> Result<(), IncomingCallError> {
        let device = self
            .device
            .as_deref()
            .ok_or(IncomingCallError::Bind(MediaError::NoDevice))?;
        let microphone = self.registry.selected_input().ok_or(IncomingCallError::NoMicrophone)?;
        device
            .set_input_device(&microphone.id)
            .await
            .map_err(IncomingCallError::Bind)?;
        connection.accept().await.map_err(IncomingCallError::Accept)
    }

    fn begin_renewal(&mut self) {
        if self.renewal.start() {
            info!(
                "Token expired, renewing once no call is active (polling every {:?})",
                self.renewal.period()
            );
        } else {
            debug!("Token renewal already pending");
        }
    }

    /// One renewal poll tick.
    ///
    /// Skipped while a call is live; otherwise the old device is torn down,
    /// a fresh token is fetched and a new device is built, and polling stops
    /// for good whatever the outcome.
    pub async fn poll_renewal(&mut self) {
        if !self.renewal.is_active() {
            return;
        }
        if self.call.is_some() {
            debug!("Call in progress, deferring token renewal");
            return;
        }
        self.renewal.cancel();

        if let Some(device) = self.device.take() {
            if let Err(e) = device.destroy().await {
                let e = TeardownError::from(e);
                error!("{}", e);
                self.log(format!("Error destroying device. {}", e.0.message));
            }
        }
        self.watching_media = false;
        self.status = DeviceStatus::Uninitialized;

        self.acquire_and_initialize().await;
        if self.device.is_some() {
            self.renewals_completed += 1;
        }
    }

    async fn refresh_media(&mut self) {
        let Some(device) = self.device.as_deref() else {
            return;
        };
        let result = self.registry.refresh(self.media.as_ref(), device).await;
        match result {
            Ok(()) => {
                self.view
                    .show_microphones(self.registry.inputs(), self.registry.selected_input());
                self.view
                    .show_speakers(self.registry.outputs(), self.registry.selected_output());
                self.log("Microphone ready");
            }
            Err(e) => {
                warn!("Error during microphone probe: {}", e);
                self.log(format!("Error detected with the microphone. {}", e));
            }
        }
    }

    pub async fn handle_command(&mut self, command: DialpadCommand) {
        if command.is_call_control() && !self.controls_enabled {
            debug!("{:?} pressed while dialpad is disabled", command);
        }
        match command {
            DialpadCommand::Digit(key) => self.press_digit(key).await,
            DialpadCommand::Hangup => self.hang_up().await,
            DialpadCommand::SelectMicrophone(descriptor) => self.select_microphone(descriptor).await,
            DialpadCommand::SelectSpeaker(descriptor) => self.select_speaker(descriptor).await,
        }
    }

    /// Append a digit to the display and send it over the live call, if any.
    async fn press_digit(&mut self, key: char) {
        let digit = match Digit::try_from(key) {
            Ok(digit) => digit,
            Err(e) => {
                warn!("Ignoring dialpad key: {}", e);
                return;
            }
        };
        self.dtmf.push(digit);
        self.view.show_dtmf(self.dtmf.as_str());

        let sent = match &self.call {
            Some(call) => call.send_digit(digit).await,
            None => return,
        };
        if let Err(e) = sent {
            self.log(format!("Could not send digit {}. {}", digit, e.message));
        }
    }

    async fn hang_up(&mut self) {
        if let Some(device) = self.device.as_deref() {
            device.disconnect_all().await;
        }
        self.dtmf.clear();
        self.view.show_dtmf(self.dtmf.as_str());
    }

    async fn select_microphone(&mut self, descriptor: MediaDeviceDescriptor) {
        let descriptor = resolve(self.registry.inputs(), descriptor);
        let name = descriptor.name.clone();
        let live_call_device = if self.call.is_some() {
            self.device.as_deref()
        } else {
            None
        };

        let result = self
            .registry
            .select_input(descriptor, self.media.as_ref(), live_call_device)
            .await;
        match result {
            Ok(()) => {
                self.view
                    .show_microphones(self.registry.inputs(), self.registry.selected_input());
                self.log(format!("Microphone changed to {}", name));
            }
            Err(e) => {
                error!("Error changing microphone to {}: {}", name, e);
                self.log(format!("Error changing microphone to {}. {}", name, e));
            }
        }
    }

    async fn select_speaker(&mut self, descriptor: MediaDeviceDescriptor) {
        let descriptor = resolve(self.registry.outputs(), descriptor);
        let name = descriptor.name.clone();

        let result = self
            .registry
            .select_output(descriptor, self.device.as_deref())
            .await;
        match result {
            Ok(()) => {
                self.view
                    .show_speakers(self.registry.outputs(), self.registry.selected_output());
                self.log(format!("Speaker changed to {}", name));
            }
            Err(e) => {
                error!("Error changing speaker to {}: {}", name, e);
                self.log(format!("Error changing speaker to {}. {}", name, e));
            }
        }
    }

    fn set_controls(&mut self, enabled: bool) {
        self.controls_enabled = enabled;
        self.view.set_controls_enabled(enabled);
    }

    fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        let entry = self.activity.push(message);
        self.view.append_log(entry);
    }
}

/// Use the enumerated label for a picked device id when one is known
fn resolve(options: &[MediaDeviceDescriptor], picked: MediaDeviceDescriptor) -> MediaDeviceDescriptor {
    options
        .iter()
        .find(|d| d.id == picked.id)
        .cloned()
        .unwrap_or(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_enumerated_label() {
        let options = vec![MediaDeviceDescriptor::new("usb", "USB Headset")];
        let picked = resolve(&options, MediaDeviceDescriptor::new("usb", "usb"));
        assert_eq!(picked.name, "USB Headset");

        let unknown = resolve(&options, MediaDeviceDescriptor::new("bt", "bt"));
        assert_eq!(unknown.name, "bt");
    }
}
