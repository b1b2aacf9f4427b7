use crate::models::device::DevicePosition;
use crate::models::error::CaptureError;
use crate::models::gallery::Thumbnail;
use crate::models::recording_result::RecordingResult;
use crate::models::state::RecordingState;

/// Notifications from the device session.
///
/// Called from the session thread or the caller's thread. Implementations
/// should marshal to the UI thread if needed.
pub trait SessionObserver: Send + Sync {
    fn on_camera_switched(&self, position: DevicePosition);

    /// Hardware delivery started or stopped.
    fn on_running_changed(&self, _running: bool) {}
}

/// Notifications from the recorder.
///
/// `on_recording_saved` and `on_error` arrive on writer or export threads.
pub trait RecorderObserver: Send + Sync {
    fn on_state_changed(&self, _state: RecordingState) {}

    /// The movie was finalized and saved to the library. Fires once per
    /// recording.
    fn on_recording_saved(&self, result: &RecordingResult);

    /// Open, finalize or export failed. Terminal for that recording only.
    fn on_error(&self, error: &CaptureError);
}

pub trait GalleryObserver: Send + Sync {
    fn on_last_gallery_image(&self, thumbnail: &Thumbnail);
}
