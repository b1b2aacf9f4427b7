use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::media::{MediaTime, Track};
use crate::storage::movie_format::{self, MovieSummary};
use crate::traits::movie_storage::TrackSettings;

/// One sample record read back from a movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieSample {
    pub track: Track,
    pub relative_time: MediaTime,
    pub data: Vec<u8>,
}

/// A finished movie opened for reading.
#[derive(Debug, Clone)]
pub struct MovieFile {
    path: PathBuf,
    summary: MovieSummary,
    tracks: Vec<TrackSettings>,
    data_offset: u64,
}

impl MovieFile {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let mut reader = BufReader::new(File::open(path).map_err(|e| storage_error("open", path, e))?);

        let mut header = [0u8; movie_format::FILE_HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|e| storage_error("read header of", path, e))?;
        let (track_count, summary) = movie_format::parse_file_header(&header)
            .ok_or_else(|| CaptureError::StorageError(format!("{} is not a movie file", path.display())))?;

        let mut tracks = Vec::with_capacity(track_count as usize);
        for _ in 0..track_count {
            let mut descriptor = [0u8; movie_format::TRACK_DESCRIPTOR_SIZE];
            reader
                .read_exact(&mut descriptor)
                .map_err(|e| storage_error("read track descriptor of", path, e))?;
            let settings = movie_format::decode_track_descriptor(&descriptor)
                .ok_or_else(|| CaptureError::StorageError(format!("bad track descriptor in {}", path.display())))?;
            tracks.push(settings);
        }

        Ok(Self {
            path: path.to_path_buf(),
            summary,
            tracks,
            data_offset: movie_format::header_size(track_count as usize) as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary(&self) -> &MovieSummary {
        &self.summary
    }

    pub fn tracks(&self) -> &[TrackSettings] {
        &self.tracks
    }

    pub fn track(&self, track: Track) -> Option<&TrackSettings> {
        self.tracks.iter().find(|t| t.track() == track)
    }

    /// Iterate sample records in file order.
    pub fn samples(&self) -> Result<MovieSamples, CaptureError> {
        let file = File::open(&self.path).map_err(|e| storage_error("open", &self.path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| storage_error("stat", &self.path, e))?
            .len();
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(self.data_offset))
            .map_err(|e| storage_error("seek in", &self.path, e))?;
        Ok(MovieSamples {
            reader,
            remaining: file_len.saturating_sub(self.data_offset),
            done: false,
        })
    }

    /// First sample of `track`, if any.
    pub fn first_sample(&self, track: Track) -> Result<Option<MovieSample>, CaptureError> {
        for sample in self.samples()? {
            let sample = sample?;
            if sample.track == track {
                return Ok(Some(sample));
            }
        }
        Ok(None)
    }
}

pub struct MovieSamples {
    reader: BufReader<File>,
    /// Bytes left after the current read position.
    remaining: u64,
    done: bool,
}

impl Iterator for MovieSamples {
    type Item = Result<MovieSample, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut header = [0u8; movie_format::SAMPLE_HEADER_SIZE];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(CaptureError::StorageError(format!("sample read failed: {}", e))));
            }
        }

        let Some((track, relative, len)) = movie_format::decode_sample_header(&header) else {
            self.done = true;
            return Some(Err(CaptureError::StorageError("corrupt sample header".into())));
        };
        self.remaining = self.remaining.saturating_sub(movie_format::SAMPLE_HEADER_SIZE as u64);
        if len as u64 > self.remaining {
            self.done = true;
            return Some(Err(CaptureError::StorageError(format!(
                "sample length {} exceeds the {} bytes left in the file",
                len, self.remaining
            ))));
        }
        self.remaining -= len as u64;

        let mut data = vec![0u8; len as usize];
        if let Err(e) = self.reader.read_exact(&mut data) {
            self.done = true;
            return Some(Err(CaptureError::StorageError(format!("truncated sample: {}", e))));
        }

        Some(Ok(MovieSample {
            track,
            relative_time: MediaTime::from_nanos(relative),
            data,
        }))
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> CaptureError {
    CaptureError::StorageError(format!("failed to {} {}: {}", action, path.display(), e))
}
