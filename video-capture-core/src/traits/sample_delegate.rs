use crate::models::media::SampleBuffer;
use crate::traits::capture_backend::DeliveryConnection;

/// Consumer registered with the capture backend.
///
/// Called on the backend's delivery threads, one per track. Implementations
/// must return quickly and never wait on the other track.
pub trait SampleBufferDelegate: Send + Sync {
    fn did_output(&self, buffer: SampleBuffer, connection: &dyn DeliveryConnection);
}

/// Downstream handler for routed sample buffers.
///
/// Equivalent to the recorder's two write paths; each method is only ever
/// called from the delivery thread of its own track.
pub trait SampleSink: Send + Sync {
    fn video_output(&self, buffer: SampleBuffer);

    fn audio_output(&self, buffer: SampleBuffer);
}
