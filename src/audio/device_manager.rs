use log::{debug, info, warn};

use crate::audio::{AudioConstraint, MediaBackend, MediaDeviceDescriptor};
use crate::device::Device;
use crate::error::MediaError;

/// Available and selected microphones and speakers
///
/// Selections only change on success: a failed probe or routing request
/// leaves the previous selection in effect.
#[derive(Debug, Default, Clone)]
pub struct MediaDeviceRegistry {
    inputs: Vec<MediaDeviceDescriptor>,
    outputs: Vec<MediaDeviceDescriptor>,
    selected_input: Option<MediaDeviceDescriptor>,
    selected_output: Option<MediaDeviceDescriptor>,
}

impl MediaDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(&self) -> &[MediaDeviceDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[MediaDeviceDescriptor] {
        &self.outputs
    }

    pub fn selected_input(&self) -> Option<&MediaDeviceDescriptor> {
        self.selected_input.as_ref()
    }

    pub fn selected_output(&self) -> Option<&MediaDeviceDescriptor> {
        self.selected_output.as_ref()
    }

    /// Unlock hardware labels with a transient capture, then re-enumerate
    /// both microphones and speakers.
    pub async fn refresh(&mut self, backend: &dyn MediaBackend, device: &dyn Device) -> Result<(), MediaError> {
        probe(backend, AudioConstraint::Any).await?;
        self.populate_inputs(device).await;
        self.populate_outputs(device).await;
        Ok(())
    }

    pub async fn refresh_inputs(&mut self, backend: &dyn MediaBackend, device: &dyn Device) -> Result<(), MediaError> {
        probe(backend, AudioConstraint::Any).await?;
        self.populate_inputs(device).await;
        Ok(())
    }

    pub async fn refresh_outputs(&mut self, backend: &dyn MediaBackend, device: &dyn Device) -> Result<(), MediaError> {
        probe(backend, AudioConstraint::Any).await?;
        self.populate_outputs(device).await;
        Ok(())
    }

    async fn populate_inputs(&mut self, device: &dyn Device) {
        self.inputs = device.available_input_devices().await;
        info!("🎤 Found {} input devices:", self.inputs.len());
        for d in &self.inputs {
            info!("  - {}", d);
        }
        self.selected_input = self.inputs.first().cloned();
        if self.selected_input.is_none() {
            warn!("⚠️ No microphone available");
        }
    }

    async fn populate_outputs(&mut self, device: &dyn Device) {
        self.outputs = device.available_output_devices().await;
        info!("🔊 Found {} output devices:", self.outputs.len());
        for d in &self.outputs {
            info!("  - {}", d);
        }
        self.selected_output = self.outputs.first().cloned();
        if self.selected_output.is_none() {
            warn!("⚠️ No speaker available");
        }
    }

    /// Switch microphone.
    ///
    /// The chosen device is probed first; when a call is live the device's
    /// input is rebound to it without interrupting the call.
    pub async fn select_input(
        &mut self,
        descriptor: MediaDeviceDescriptor,
        backend: &dyn MediaBackend,
        live_call_device: Option<&dyn Device>,
    ) -> Result<(), MediaError> {
        probe(backend, AudioConstraint::Device(descriptor.id.clone())).await?;
        // The bound input may differ from the selection after a refresh
        if let Some(device) = live_call_device {
            device.set_input_device(&descriptor.id).await?;
            debug!("Rebound call input to {}", descriptor.id);
        }
        self.selected_input = Some(descriptor);
        Ok(())
    }

    /// Switch speaker. Output routing needs no permission probe.
    pub async fn select_output(
        &mut self,
        descriptor: MediaDeviceDescriptor,
        device: Option<&dyn Device>,
    ) -> Result<(), MediaError> {
        let device = device.ok_or(MediaError::NoDevice)?;
        device.set_output_device(&descriptor.id).await?;
        self.selected_output = Some(descriptor);
        Ok(())
    }
}

/// Acquire a capture stream purely to validate access, then release it.
async fn probe(backend: &dyn MediaBackend, constraint: AudioConstraint) -> Result<(), MediaError> {
    let stream = backend.acquire_audio(constraint).await?;
    debug!("Releasing {} probe track(s)", stream.track_count());
    stream.stop_all();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::simulated::{SimulatedMedia, Simulator};

    fn mic(id: &str) -> MediaDeviceDescriptor {
        MediaDeviceDescriptor::new(id, format!("Mic {}", id))
    }

    #[tokio::test]
    async fn refresh_selects_first_entries_and_releases_probe() {
        let simulator = Simulator::new();
        let device = simulator.standalone_device();
        let media = SimulatedMedia::new(simulator.clone());
        let mut registry = MediaDeviceRegistry::new();

        registry.refresh(&media, device.as_ref()).await.unwrap();

        assert_eq!(registry.inputs().len(), 2);
        assert_eq!(registry.selected_input(), registry.inputs().first());
        assert_eq!(registry.selected_output(), registry.outputs().first());
        assert_eq!(simulator.open_tracks(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_previous_lists() {
        let simulator = Simulator::new();
        let device = simulator.standalone_device();
        let media = SimulatedMedia::new(simulator.clone());
        let mut registry = MediaDeviceRegistry::new();
        registry.refresh(&media, device.as_ref()).await.unwrap();
        let before = registry.selected_input().cloned();

        simulator.deny_microphone(true);
        let result = registry.refresh_inputs(&media, device.as_ref()).await;

        assert!(matches!(result, Err(MediaError::PermissionDenied(_))));
        assert_eq!(registry.selected_input().cloned(), before);
    }

    #[tokio::test]
    async fn select_unknown_microphone_keeps_previous() {
        let simulator = Simulator::new();
        let device = simulator.standalone_device();
        let media = SimulatedMedia::new(simulator.clone());
        let mut registry = MediaDeviceRegistry::new();
        registry.refresh(&media, device.as_ref()).await.unwrap();
        let before = registry.selected_input().cloned();

        let result = registry.select_input(mic("missing"), &media, None).await;

        assert!(matches!(result, Err(MediaError::NotFound(_))));
        assert_eq!(registry.selected_input().cloned(), before);
    }

    #[tokio::test]
    async fn select_microphone_without_call_does_not_rebind() {
        let simulator = Simulator::new();
        let device = simulator.standalone_device();
        let media = SimulatedMedia::new(simulator.clone());
        let mut registry = MediaDeviceRegistry::new();

        registry.select_input(mic("usb-headset"), &media, None).await.unwrap();

        assert_eq!(registry.selected_input().map(|d| d.id.as_str()), Some("usb-headset"));
        assert_eq!(simulator.bound_input(), None);
        drop(device);
    }

    #[tokio::test]
    async fn select_microphone_during_call_always_rebinds() {
        let simulator = Simulator::new();
        let device = simulator.standalone_device();
        let media = SimulatedMedia::new(simulator.clone());
        let mut registry = MediaDeviceRegistry::new();
        registry.refresh(&media, device.as_ref()).await.unwrap();

        registry
            .select_input(mic("default"), &media, Some(device.as_ref()))
            .await
            .unwrap();

        assert_eq!(simulator.bound_input().as_deref(), Some("default"));
        assert_eq!(simulator.input_binds(), 1);
    }

    #[tokio::test]
    async fn refresh_outputs_leaves_inputs_alone() {
        let simulator = Simulator::new();
        let device = simulator.standalone_device();
        let media = SimulatedMedia::new(simulator.clone());
        let mut registry = MediaDeviceRegistry::new();

        registry.refresh_outputs(&media, device.as_ref()).await.unwrap();

        assert_eq!(registry.outputs().len(), 2);
        assert_eq!(registry.selected_output().map(|d| d.id.as_str()), Some("default"));
        assert!(registry.inputs().is_empty());
        assert!(registry.selected_input().is_none());
        assert_eq!(simulator.probes(), vec![AudioConstraint::Any]);
        assert_eq!(simulator.open_tracks(), 0);
    }

    #[tokio::test]
    async fn refresh_outputs_fails_without_microphone_access() {
        let simulator = Simulator::new();
        let device = simulator.standalone_device();
        let media = SimulatedMedia::new(simulator.clone());
        let mut registry = MediaDeviceRegistry::new();
        simulator.deny_microphone(true);

        let result = registry.refresh_outputs(&media, device.as_ref()).await;

        assert!(matches!(result, Err(MediaError::PermissionDenied(_))));
        assert!(registry.outputs().is_empty());
    }

    #[tokio::test]
    async fn select_speaker_requires_device() {
        let mut registry = MediaDeviceRegistry::new();
        let result = registry
            .select_output(MediaDeviceDescriptor::new("default", "Speakers"), None)
            .await;
        assert_eq!(result, Err(MediaError::NoDevice));
        assert!(registry.selected_output().is_none());
    }
}
