use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::{MediaTime, Track};

/// Result delivered once a movie has been finalized and saved to the library.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    /// Location of the movie inside the library.
    pub file_path: PathBuf,
    /// Presentation time of the first accepted buffer.
    pub origin: MediaTime,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

impl RecordingResult {
    pub fn track(&self, track: Track) -> Option<&TrackSummary> {
        self.metadata.tracks.iter().find(|t| t.track == track)
    }
}

/// Per-track sample counts of a finished movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub track: Track,
    /// Samples the writer persisted.
    pub written: u64,
    /// Samples accepted by the recorder but skipped because the track had no
    /// capacity.
    pub dropped: u64,
}

/// A run of consecutive muted audio buffers, relative to the movie origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteSegment {
    pub start_nanos: i64,
    pub end_nanos: i64,
}

impl MuteSegment {
    pub fn duration_nanos(&self) -> i64 {
        self.end_nanos - self.start_nanos
    }
}

/// Metadata stored alongside a recording as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub duration_secs: f64,
    pub origin_nanos: i64,
    pub file_path: String,
    pub checksum: String,
    pub tracks: Vec<TrackSummary>,
    pub muted_segments: Vec<MuteSegment>,
}
