use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Rational media timestamp: `value / timescale` seconds.
///
/// Capture hardware stamps buffers on its own clock, so the absolute value is
/// meaningless until a write session picks an origin. Comparison and
/// arithmetic go through nanoseconds, so `1/30` and `2/60` compare equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: u32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1_000_000_000,
    };

    /// A zero timescale is clamped to 1.
    pub fn new(value: i64, timescale: u32) -> Self {
        Self {
            value,
            timescale: timescale.max(1),
        }
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self::new(nanos, NANOS_PER_SEC as u32)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_nanos((secs * NANOS_PER_SEC as f64).round() as i64)
    }

    pub fn as_nanos(&self) -> i64 {
        let nanos = self.value as i128 * NANOS_PER_SEC / self.timescale.max(1) as i128;
        nanos.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale.max(1) as f64
    }

    /// Offset of `self` from `origin`, in nanoseconds.
    pub fn relative_to(&self, origin: MediaTime) -> MediaTime {
        MediaTime::from_nanos(self.as_nanos().saturating_sub(origin.as_nanos()))
    }

    pub fn is_negative(&self) -> bool {
        self.value < 0
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.as_nanos() == other.as_nanos()
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_nanos().cmp(&other.as_nanos())
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// Which track of the movie a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Video,
    Audio,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Frame dimensions as reported by the video format description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixel layout of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit blue, green, red, alpha.
    Bgra32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Bgra32 => 4,
        }
    }

    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Bgra32 => *b"BGRA",
        }
    }

    pub fn from_fourcc(code: [u8; 4]) -> Option<Self> {
        match &code {
            b"BGRA" => Some(Self::Bgra32),
            _ => None,
        }
    }
}

/// Pixel data of one video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub dimensions: Dimensions,
    pub format: PixelFormat,
    pub bytes_per_row: usize,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Tightly packed buffer (`bytes_per_row == width * bpp`).
    pub fn packed(dimensions: Dimensions, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            dimensions,
            format,
            bytes_per_row: dimensions.width as usize * format.bytes_per_pixel(),
            data,
        }
    }
}

/// One packet of interleaved 16-bit PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlock {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_count: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplePayload {
    Video(PixelBuffer),
    Audio(AudioBlock),
}

/// A timestamped chunk of media delivered by the capture hardware.
///
/// Buffers move through the pipeline by value and are consumed once. The only
/// mutation after delivery is [`SampleBuffer::zero_payload`], used to mute
/// audio without breaking track continuity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    presentation_time: MediaTime,
    data_ready: bool,
    payload: SamplePayload,
}

impl SampleBuffer {
    pub fn video(presentation_time: MediaTime, pixels: PixelBuffer) -> Self {
        Self {
            presentation_time,
            data_ready: true,
            payload: SamplePayload::Video(pixels),
        }
    }

    pub fn audio(presentation_time: MediaTime, block: AudioBlock) -> Self {
        Self {
            presentation_time,
            data_ready: true,
            payload: SamplePayload::Audio(block),
        }
    }

    /// Marks whether the underlying data has landed yet.
    pub fn with_data_ready(mut self, ready: bool) -> Self {
        self.data_ready = ready;
        self
    }

    pub fn track(&self) -> Track {
        match self.payload {
            SamplePayload::Video(_) => Track::Video,
            SamplePayload::Audio(_) => Track::Audio,
        }
    }

    pub fn presentation_time(&self) -> MediaTime {
        self.presentation_time
    }

    pub fn is_data_ready(&self) -> bool {
        self.data_ready
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        match &self.payload {
            SamplePayload::Video(pixels) => Some(pixels.dimensions),
            SamplePayload::Audio(_) => None,
        }
    }

    pub fn payload(&self) -> &SamplePayload {
        &self.payload
    }

    pub fn data(&self) -> &[u8] {
        match &self.payload {
            SamplePayload::Video(pixels) => &pixels.data,
            SamplePayload::Audio(block) => &block.data,
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        match self.payload {
            SamplePayload::Video(pixels) => pixels.data,
            SamplePayload::Audio(block) => block.data,
        }
    }

    /// Overwrites the payload bytes with zeros, keeping length and timing.
    pub fn zero_payload(&mut self) {
        let data = match &mut self.payload {
            SamplePayload::Video(pixels) => &mut pixels.data,
            SamplePayload::Audio(block) => &mut block.data,
        };
        data.fill(0);
    }
}
