use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::{Dimensions, PixelFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
}

impl VideoCodec {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::H264 => *b"avc1",
            Self::Hevc => *b"hvc1",
        }
    }

    pub fn from_fourcc(code: [u8; 4]) -> Option<Self> {
        match &code {
            b"avc1" => Some(Self::H264),
            b"hvc1" => Some(Self::Hevc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Aac,
    LinearPcm,
}

impl AudioFormat {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Aac => *b"aac ",
            Self::LinearPcm => *b"lpcm",
        }
    }

    pub fn from_fourcc(code: [u8; 4]) -> Option<Self> {
        match &code {
            b"aac " => Some(Self::Aac),
            b"lpcm" => Some(Self::LinearPcm),
            _ => None,
        }
    }
}

/// Output settings of the video track. Dimensions are not part of this:
/// they come from the first captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub codec: VideoCodec,
    pub average_bit_rate: u32,
    pub pixel_format: PixelFormat,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            average_bit_rate: 2_300_000,
            pixel_format: PixelFormat::Bgra32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            format: AudioFormat::Aac,
            sample_rate: 44_100,
            channels: 1,
            bit_rate: 64_000,
        }
    }
}

/// Configuration for the recorder and its movie files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfiguration {
    /// Directory for in-progress movies (default: system temp dir).
    pub output_directory: PathBuf,

    /// Extension of movie files (default: "mov").
    pub file_extension: String,

    pub video: VideoSettings,

    pub audio: AudioSettings,

    /// Tracks accept best-effort timing instead of guaranteed ordering
    /// (default: true).
    pub expects_real_time: bool,

    /// Samples each track may queue before reporting it has no capacity
    /// (default: 30).
    pub track_queue_depth: usize,

    /// Size of gallery thumbnails (default: 100x100).
    pub thumbnail_size: Dimensions,

    /// Write a JSON sidecar next to each finished movie (default: true).
    pub write_metadata: bool,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.file_extension.is_empty() || self.file_extension.contains('.') {
            return Err(format!("invalid file extension: {:?}", self.file_extension));
        }
        if self.audio.sample_rate == 0 {
            return Err("audio sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.audio.channels) {
            return Err(format!("unsupported channel count: {}", self.audio.channels));
        }
        if self.video.average_bit_rate == 0 || self.audio.bit_rate == 0 {
            return Err("bit rates must be positive".into());
        }
        if self.track_queue_depth == 0 {
            return Err("track queue depth must be at least 1".into());
        }
        if self.thumbnail_size.is_empty() {
            return Err("thumbnail size must be non-empty".into());
        }
        Ok(())
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            output_directory: std::env::temp_dir(),
            file_extension: "mov".into(),
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
            expects_real_time: true,
            track_queue_depth: 30,
            thumbnail_size: Dimensions::new(100, 100),
            write_metadata: true,
        }
    }
}
