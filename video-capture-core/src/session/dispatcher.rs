use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::models::media::{SampleBuffer, Track};
use crate::models::orientation::{CaptureOrientation, DeviceOrientation};
use crate::traits::capture_backend::DeliveryConnection;
use crate::traits::sample_delegate::{SampleBufferDelegate, SampleSink};

/// The live delivery path between the capture backend and the recorder.
///
/// Registered as the only consumer for both tracks. Each callback runs on
/// that track's delivery thread; nothing here blocks or copies the buffer.
///
/// ```text
/// [video delivery] ─┐                      ┌→ sink.video_output
///                   ├→ orientation, ready? ┤
/// [audio delivery] ─┘                      └→ sink.audio_output
/// ```
pub struct SampleDispatcher {
    sink: Arc<dyn SampleSink>,
    device_orientation: AtomicU8,
}

impl SampleDispatcher {
    pub fn new(sink: Arc<dyn SampleSink>) -> Self {
        Self {
            sink,
            device_orientation: AtomicU8::new(DeviceOrientation::Unknown.to_raw()),
        }
    }

    /// Update from the motion sensors. Read on every video frame.
    pub fn set_device_orientation(&self, orientation: DeviceOrientation) {
        self.device_orientation.store(orientation.to_raw(), Ordering::Relaxed);
    }

    pub fn device_orientation(&self) -> DeviceOrientation {
        DeviceOrientation::from_raw(self.device_orientation.load(Ordering::Relaxed))
    }

    pub fn capture_orientation(&self) -> CaptureOrientation {
        CaptureOrientation::from(self.device_orientation())
    }
}

impl SampleBufferDelegate for SampleDispatcher {
    fn did_output(&self, buffer: SampleBuffer, connection: &dyn DeliveryConnection) {
        let track = buffer.track();

        // Applied before the readiness check so the connection stays in sync
        // even for frames that are discarded.
        if track == Track::Video {
            connection.set_video_orientation(self.capture_orientation());
        }

        if !buffer.is_data_ready() {
            log::trace!("Discarding {} buffer: data not ready", track.as_str());
            return;
        }

        match track {
            Track::Video => self.sink.video_output(buffer),
            Track::Audio => self.sink.audio_output(buffer),
        }
    }
}
