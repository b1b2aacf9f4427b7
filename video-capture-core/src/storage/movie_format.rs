//! Movie container layout.
//!
//! A movie is a fixed file header, one descriptor per track, then a stream of
//! sample records in arrival order. All integers are little-endian. The
//! summary fields of the file header are zero while writing and patched in
//! place on finalization.
//!
//! File header (48 bytes):
//! ```text
//! [0-3]    "VCMV"
//! [4-5]    version (1)
//! [6-7]    track count
//! [8-15]   origin, ns (i64)
//! [16-23]  duration, ns (i64)
//! [24-31]  video sample count (u64)
//! [32-39]  audio sample count (u64)
//! [40-47]  reserved
//! ```
//!
//! Track descriptor (32 bytes):
//! ```text
//! [0]      track kind (0 = video, 1 = audio)
//! [1-4]    codec fourcc
//! [5]      expects real time (0/1)
//! [8-11]   video: width        audio: sample rate
//! [12-15]  video: height       audio: channels (u16) + reserved
//! [16-19]  bit rate
//! [20-23]  video: pixel format fourcc
//! ```
//!
//! Sample record:
//! ```text
//! [0]      track kind
//! [4-11]   time relative to origin, ns (i64)
//! [12-15]  payload length (u32)
//! [16..]   payload
//! ```

use crate::models::config::{AudioFormat, VideoCodec};
use crate::models::media::{Dimensions, PixelFormat, Track};
use crate::traits::movie_storage::TrackSettings;

pub const MAGIC: &[u8; 4] = b"VCMV";
pub const VERSION: u16 = 1;
pub const FILE_HEADER_SIZE: usize = 48;
pub const TRACK_DESCRIPTOR_SIZE: usize = 32;
pub const SAMPLE_HEADER_SIZE: usize = 16;
/// Offset of the patchable summary inside the file header.
pub const SUMMARY_OFFSET: u64 = 8;
pub const SUMMARY_SIZE: usize = 32;

/// Totals written into the file header on finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovieSummary {
    pub origin_nanos: i64,
    pub duration_nanos: i64,
    pub video_samples: u64,
    pub audio_samples: u64,
}

/// Size of the file header plus all track descriptors.
pub fn header_size(track_count: usize) -> usize {
    FILE_HEADER_SIZE + track_count * TRACK_DESCRIPTOR_SIZE
}

pub fn track_kind(track: Track) -> u8 {
    match track {
        Track::Video => 0,
        Track::Audio => 1,
    }
}

pub fn track_from_kind(kind: u8) -> Option<Track> {
    match kind {
        0 => Some(Track::Video),
        1 => Some(Track::Audio),
        _ => None,
    }
}

/// File header with an empty summary.
pub fn generate_file_header(track_count: u16) -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header[6..8].copy_from_slice(&track_count.to_le_bytes());
    header
}

pub fn encode_summary(summary: &MovieSummary) -> [u8; SUMMARY_SIZE] {
    let mut bytes = [0u8; SUMMARY_SIZE];
    bytes[0..8].copy_from_slice(&summary.origin_nanos.to_le_bytes());
    bytes[8..16].copy_from_slice(&summary.duration_nanos.to_le_bytes());
    bytes[16..24].copy_from_slice(&summary.video_samples.to_le_bytes());
    bytes[24..32].copy_from_slice(&summary.audio_samples.to_le_bytes());
    bytes
}

/// Patch the summary fields of an in-memory file header.
pub fn patch_summary(header: &mut [u8], summary: &MovieSummary) {
    let start = SUMMARY_OFFSET as usize;
    header[start..start + SUMMARY_SIZE].copy_from_slice(&encode_summary(summary));
}

/// Parse a file header, returning the track count and summary.
pub fn parse_file_header(header: &[u8]) -> Option<(u16, MovieSummary)> {
    if header.len() < FILE_HEADER_SIZE || &header[0..4] != MAGIC {
        return None;
    }
    if u16::from_le_bytes([header[4], header[5]]) != VERSION {
        return None;
    }
    let track_count = u16::from_le_bytes([header[6], header[7]]);
    let summary = MovieSummary {
        origin_nanos: i64::from_le_bytes(header[8..16].try_into().ok()?),
        duration_nanos: i64::from_le_bytes(header[16..24].try_into().ok()?),
        video_samples: u64::from_le_bytes(header[24..32].try_into().ok()?),
        audio_samples: u64::from_le_bytes(header[32..40].try_into().ok()?),
    };
    Some((track_count, summary))
}

pub fn encode_track_descriptor(settings: &TrackSettings) -> [u8; TRACK_DESCRIPTOR_SIZE] {
    let mut bytes = [0u8; TRACK_DESCRIPTOR_SIZE];
    bytes[0] = track_kind(settings.track());
    bytes[5] = settings.expects_real_time() as u8;

    match settings {
        TrackSettings::Video {
            codec,
            dimensions,
            average_bit_rate,
            pixel_format,
            ..
        } => {
            bytes[1..5].copy_from_slice(&codec.fourcc());
            bytes[8..12].copy_from_slice(&dimensions.width.to_le_bytes());
            bytes[12..16].copy_from_slice(&dimensions.height.to_le_bytes());
            bytes[16..20].copy_from_slice(&average_bit_rate.to_le_bytes());
            bytes[20..24].copy_from_slice(&pixel_format.fourcc());
        }
        TrackSettings::Audio {
            format,
            sample_rate,
            channels,
            bit_rate,
            ..
        } => {
            bytes[1..5].copy_from_slice(&format.fourcc());
            bytes[8..12].copy_from_slice(&sample_rate.to_le_bytes());
            bytes[12..14].copy_from_slice(&channels.to_le_bytes());
            bytes[16..20].copy_from_slice(&bit_rate.to_le_bytes());
        }
    }
    bytes
}

pub fn decode_track_descriptor(bytes: &[u8]) -> Option<TrackSettings> {
    if bytes.len() < TRACK_DESCRIPTOR_SIZE {
        return None;
    }
    let fourcc: [u8; 4] = bytes[1..5].try_into().ok()?;
    let expects_real_time = bytes[5] != 0;
    let word = |at: usize| -> Option<u32> { Some(u32::from_le_bytes(bytes[at..at + 4].try_into().ok()?)) };

    match track_from_kind(bytes[0])? {
        Track::Video => Some(TrackSettings::Video {
            codec: VideoCodec::from_fourcc(fourcc)?,
            dimensions: Dimensions::new(word(8)?, word(12)?),
            average_bit_rate: word(16)?,
            pixel_format: PixelFormat::from_fourcc(bytes[20..24].try_into().ok()?)?,
            expects_real_time,
        }),
        Track::Audio => Some(TrackSettings::Audio {
            format: AudioFormat::from_fourcc(fourcc)?,
            sample_rate: word(8)?,
            channels: u16::from_le_bytes([bytes[12], bytes[13]]),
            bit_rate: word(16)?,
            expects_real_time,
        }),
    }
}

pub fn encode_sample_header(track: Track, relative_nanos: i64, payload_len: u32) -> [u8; SAMPLE_HEADER_SIZE] {
    let mut bytes = [0u8; SAMPLE_HEADER_SIZE];
    bytes[0] = track_kind(track);
    bytes[4..12].copy_from_slice(&relative_nanos.to_le_bytes());
    bytes[12..16].copy_from_slice(&payload_len.to_le_bytes());
    bytes
}

/// Returns `(track, relative ns, payload length)`.
pub fn decode_sample_header(bytes: &[u8; SAMPLE_HEADER_SIZE]) -> Option<(Track, i64, u32)> {
    let track = track_from_kind(bytes[0])?;
    let relative = i64::from_le_bytes(bytes[4..12].try_into().ok()?);
    let len = u32::from_le_bytes(bytes[12..16].try_into().ok()?);
    Some((track, relative, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{AudioSettings, VideoSettings};

    #[test]
    fn header_magic_and_track_count() {
        let header = generate_file_header(2);
        assert_eq!(header.len(), 48);
        assert_eq!(&header[0..4], b"VCMV");
        assert_eq!(u16::from_le_bytes([header[4], header[5]]), 1);
        assert_eq!(u16::from_le_bytes([header[6], header[7]]), 2);
        // Summary is zero until finalization
        assert!(header[8..48].iter().all(|b| *b == 0));
    }

    #[test]
    fn patch_summary_fields() {
        let mut header = generate_file_header(2);
        let summary = MovieSummary {
            origin_nanos: 1_500_000_000,
            duration_nanos: 3_000_000_000,
            video_samples: 90,
            audio_samples: 130,
        };
        patch_summary(&mut header, &summary);

        let origin = i64::from_le_bytes(header[8..16].try_into().unwrap());
        assert_eq!(origin, 1_500_000_000);
        let video = u64::from_le_bytes(header[24..32].try_into().unwrap());
        assert_eq!(video, 90);

        let (tracks, parsed) = parse_file_header(&header).unwrap();
        assert_eq!(tracks, 2);
        assert_eq!(parsed, summary);
    }

    #[test]
    fn parse_rejects_foreign_files() {
        let mut header = generate_file_header(1);
        header[0..4].copy_from_slice(b"RIFF");
        assert!(parse_file_header(&header).is_none());
        assert!(parse_file_header(&[0u8; 10]).is_none());
    }

    #[test]
    fn video_descriptor_layout() {
        let settings = TrackSettings::video(Dimensions::new(1920, 1080), &VideoSettings::default(), true);
        let bytes = encode_track_descriptor(&settings);

        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..5], b"avc1");
        assert_eq!(bytes[5], 1);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 1920);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 1080);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 2_300_000);
        assert_eq!(&bytes[20..24], b"BGRA");

        assert_eq!(decode_track_descriptor(&bytes), Some(settings));
    }

    #[test]
    fn audio_descriptor_layout() {
        let settings = TrackSettings::audio(&AudioSettings::default(), false);
        let bytes = encode_track_descriptor(&settings);

        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], b"aac ");
        assert_eq!(bytes[5], 0);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 44_100);
        assert_eq!(u16::from_le_bytes([bytes[12], bytes[13]]), 1);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 64_000);
    }

    #[test]
    fn sample_header_keeps_negative_offsets() {
        let bytes = encode_sample_header(Track::Audio, -5, 1024);
        assert_eq!(decode_sample_header(&bytes), Some((Track::Audio, -5, 1024)));
    }
}
