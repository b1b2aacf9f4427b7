//! # video-capture-core
//!
//! Platform-agnostic camera capture and recording core.
//!
//! Builds a capture graph over a platform backend, routes the live video and
//! audio sample streams to a muxer, and writes them into one movie file that
//! is handed to the photo library when recording stops. Platform backends
//! implement the `CaptureBackend` trait and plug into the generic
//! `DeviceSession`.
//!
//! ## Architecture
//!
//! ```text
//! video-capture-core (this crate)
//! ├── traits/       ← CaptureBackend, SampleBufferDelegate, MovieStorage, PhotoLibrary, observers
//! ├── models/       ← CaptureError, RecordingState, RecorderConfiguration, SampleBuffer, MediaTime, etc.
//! ├── session/      ← DeviceSession, SampleDispatcher, Recorder, GalleryPreview, CapturePipeline
//! └── storage/      ← MovieFileWriter, MovieFile, DirectoryLibrary, metadata
//! ```

pub mod models;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{AudioFormat, AudioSettings, RecorderConfiguration, VideoCodec, VideoSettings};
pub use models::device::{Device, DeviceKind, DevicePosition, SessionPreset, TorchMode};
pub use models::error::{CaptureError, ExportError, SetupError, SwitchError, TorchError, WriteError};
pub use models::gallery::{AssetKind, Thumbnail};
pub use models::media::{AudioBlock, Dimensions, MediaTime, PixelBuffer, PixelFormat, SampleBuffer, SamplePayload, Track};
pub use models::orientation::{CaptureOrientation, DeviceOrientation};
pub use models::recording_result::{MuteSegment, RecordingMetadata, RecordingResult, TrackSummary};
pub use models::state::{RecordingState, WriteSessionStatus, WriterStatus};
pub use session::device_session::DeviceSession;
pub use session::dispatcher::SampleDispatcher;
pub use session::gallery::GalleryPreview;
pub use session::pipeline::CapturePipeline;
pub use session::recorder::Recorder;
pub use storage::library::DirectoryLibrary;
pub use storage::movie_reader::{MovieFile, MovieSample};
pub use storage::movie_writer::{MovieFileStorage, MovieFileWriter};
pub use traits::capture_backend::{CaptureBackend, ConfigurationLock, DeliveryConnection};
pub use traits::movie_storage::{FinishCallback, FinishedMovie, MovieStorage, MovieWriter, TrackSettings};
pub use traits::observers::{GalleryObserver, RecorderObserver, SessionObserver};
pub use traits::photo_library::{ExportCallback, PhotoLibrary};
pub use traits::sample_delegate::{SampleBufferDelegate, SampleSink};
