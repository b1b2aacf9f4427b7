use std::sync::Arc;

use crate::models::device::{Device, DeviceKind, SessionPreset, TorchMode};
use crate::models::error::CaptureError;
use crate::models::media::Track;
use crate::models::orientation::CaptureOrientation;
use crate::traits::sample_delegate::SampleBufferDelegate;

/// The delivery path a sample buffer arrived on.
///
/// Video connections carry an orientation that the consumer sets before
/// reading the frame.
pub trait DeliveryConnection: Send + Sync {
    fn track(&self) -> Track;

    fn set_video_orientation(&self, orientation: CaptureOrientation);

    fn video_orientation(&self) -> CaptureOrientation;
}

/// Interface to the platform capture hardware.
///
/// Implementations own the device registry and the capture graph. Inputs and
/// outputs are added and removed through `&self`; the backend is shared with
/// its own delivery threads, so implementations use interior mutability.
///
/// Video and audio buffers are pushed on two independent delivery threads to
/// whichever delegate is registered for that track.
pub trait CaptureBackend: Send + Sync {
    /// Discover devices of one kind, in preference order.
    fn devices(&self, kind: DeviceKind) -> Vec<Device>;

    /// System default device of one kind.
    fn default_device(&self, kind: DeviceKind) -> Option<Device> {
        self.devices(kind).into_iter().next()
    }

    fn set_preset(&self, preset: SessionPreset) -> Result<(), CaptureError>;

    /// Construct an input for `device` and add it to the graph.
    fn add_input(&self, device: &Device) -> Result<(), CaptureError>;

    fn remove_input(&self, device: &Device);

    /// Register the single consumer for one track.
    fn add_output(&self, track: Track, delegate: Arc<dyn SampleBufferDelegate>) -> Result<(), CaptureError>;

    fn remove_output(&self, track: Track);

    /// Start hardware delivery. May block until the hardware is up.
    fn start_running(&self);

    /// Stop hardware delivery. Returns once no delivery callback is in flight.
    fn stop_running(&self);

    fn is_running(&self) -> bool;

    /// Acquire exclusive configuration access to a device.
    fn lock_for_configuration(&self, device: &Device) -> Result<(), CaptureError>;

    fn unlock_for_configuration(&self, device: &Device);

    fn torch_mode(&self, device: &Device) -> TorchMode;

    fn is_torch_mode_supported(&self, device: &Device, mode: TorchMode) -> bool;

    /// Requires the device to be locked for configuration.
    fn set_torch_mode(&self, device: &Device, mode: TorchMode) -> Result<(), CaptureError>;
}

/// Scoped exclusive configuration lock on a device.
///
/// Unlocks when dropped, so every exit path releases the device.
pub struct ConfigurationLock<'a, B: CaptureBackend + ?Sized> {
    backend: &'a B,
    device: &'a Device,
}

impl<'a, B: CaptureBackend + ?Sized> ConfigurationLock<'a, B> {
    pub fn acquire(backend: &'a B, device: &'a Device) -> Result<Self, CaptureError> {
        backend.lock_for_configuration(device)?;
        Ok(Self { backend, device })
    }

    pub fn device(&self) -> &Device {
        self.device
    }
}

impl<B: CaptureBackend + ?Sized> Drop for ConfigurationLock<'_, B> {
    fn drop(&mut self) {
        self.backend.unlock_for_configuration(self.device);
    }
}
