use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::config::{AudioFormat, AudioSettings, VideoCodec, VideoSettings};
use crate::models::error::WriteError;
use crate::models::media::{Dimensions, MediaTime, PixelFormat, SampleBuffer, Track};
use crate::models::state::WriterStatus;

/// Output settings of one movie track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSettings {
    Video {
        codec: VideoCodec,
        dimensions: Dimensions,
        average_bit_rate: u32,
        pixel_format: PixelFormat,
        expects_real_time: bool,
    },
    Audio {
        format: AudioFormat,
        sample_rate: u32,
        channels: u16,
        bit_rate: u32,
        expects_real_time: bool,
    },
}

impl TrackSettings {
    pub fn video(dimensions: Dimensions, settings: &VideoSettings, expects_real_time: bool) -> Self {
        Self::Video {
            codec: settings.codec,
            dimensions,
            average_bit_rate: settings.average_bit_rate,
            pixel_format: settings.pixel_format,
            expects_real_time,
        }
    }

    pub fn audio(settings: &AudioSettings, expects_real_time: bool) -> Self {
        Self::Audio {
            format: settings.format,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            bit_rate: settings.bit_rate,
            expects_real_time,
        }
    }

    pub fn track(&self) -> Track {
        match self {
            Self::Video { .. } => Track::Video,
            Self::Audio { .. } => Track::Audio,
        }
    }

    pub fn expects_real_time(&self) -> bool {
        match self {
            Self::Video { expects_real_time, .. } | Self::Audio { expects_real_time, .. } => *expects_real_time,
        }
    }
}

/// Summary of a finalized movie.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedMovie {
    pub path: PathBuf,
    pub origin: MediaTime,
    /// Relative time of the last written sample.
    pub duration: MediaTime,
    pub video_samples: u64,
    pub audio_samples: u64,
    pub checksum: String,
}

impl FinishedMovie {
    pub fn samples(&self, track: Track) -> u64 {
        match track {
            Track::Video => self.video_samples,
            Track::Audio => self.audio_samples,
        }
    }
}

/// Invoked exactly once when finalization ends.
pub type FinishCallback = Box<dyn FnOnce(Result<FinishedMovie, WriteError>) + Send + 'static>;

/// An incremental movie writer with one input per track.
///
/// `append` never blocks: callers poll `is_ready_for_more_media_data` and
/// skip the sample when the track has no capacity.
pub trait MovieWriter: Send + Sync {
    fn output_path(&self) -> &Path;

    fn status(&self) -> WriterStatus;

    /// Open the container. Transitions: unknown → writing.
    fn start_writing(&self) -> Result<(), WriteError>;

    /// Set the session origin. Samples are stored relative to it; only the
    /// first call has any effect.
    fn start_session(&self, origin: MediaTime);

    fn is_ready_for_more_media_data(&self, track: Track) -> bool;

    fn append(&self, buffer: SampleBuffer) -> Result<(), WriteError>;

    /// Finalize asynchronously. Transitions: writing → completed / failed.
    fn finish_writing(&self, completion: FinishCallback);

    /// Abandon the movie and remove the partial file.
    fn cancel_writing(&self);
}

/// Factory for movie writers.
pub trait MovieStorage: Send + Sync {
    fn create_writer(&self, path: &Path, tracks: &[TrackSettings]) -> Result<Arc<dyn MovieWriter>, WriteError>;
}

impl<T: MovieStorage + ?Sized> MovieStorage for Arc<T> {
    fn create_writer(&self, path: &Path, tracks: &[TrackSettings]) -> Result<Arc<dyn MovieWriter>, WriteError> {
        (**self).create_writer(path, tracks)
    }
}
