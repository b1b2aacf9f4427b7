use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use crossbeam_channel::{bounded, never, select, unbounded, Receiver, SendError, Sender, TrySendError};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::config::RecorderConfiguration;
use crate::models::error::WriteError;
use crate::models::media::{MediaTime, SampleBuffer, Track};
use crate::models::state::WriterStatus;
use crate::storage::movie_format::{self, MovieSummary};
use crate::traits::movie_storage::{FinishCallback, FinishedMovie, MovieStorage, MovieWriter, TrackSettings};

/// Creates file-backed [`MovieFileWriter`]s.
#[derive(Debug, Clone)]
pub struct MovieFileStorage {
    queue_depth: usize,
}

impl MovieFileStorage {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth: queue_depth.max(1),
        }
    }

    pub fn from_config(config: &RecorderConfiguration) -> Self {
        Self::new(config.track_queue_depth)
    }
}

impl Default for MovieFileStorage {
    fn default() -> Self {
        Self::from_config(&RecorderConfiguration::default())
    }
}

impl MovieStorage for MovieFileStorage {
    fn create_writer(&self, path: &Path, tracks: &[TrackSettings]) -> Result<Arc<dyn MovieWriter>, WriteError> {
        let writer = MovieFileWriter::new(path.to_path_buf(), tracks.to_vec(), self.queue_depth)?;
        Ok(Arc::new(writer))
    }
}

enum Control {
    Finish(FinishCallback),
    Cancel,
}

/// Receivers handed to the writer thread by `start_writing`.
struct PendingReceivers {
    video: Option<Receiver<SampleBuffer>>,
    audio: Option<Receiver<SampleBuffer>>,
    control: Receiver<Control>,
}

/// Streaming movie writer.
///
/// Each track has a bounded queue; a track "has capacity" while its queue is
/// not full. A dedicated writer thread drains both queues into the file in
/// arrival order, so appends from the delivery threads never touch the disk.
///
/// ## File Format
///
/// See [`movie_format`]: header and track descriptors, then
/// `[sample header | payload]` records. Header totals are patched on finish.
pub struct MovieFileWriter {
    file_path: PathBuf,
    tracks: Vec<TrackSettings>,
    status: Arc<Mutex<WriterStatus>>,
    origin: Arc<OnceLock<MediaTime>>,
    accepting: Arc<AtomicBool>,
    video: Option<Sender<SampleBuffer>>,
    audio: Option<Sender<SampleBuffer>>,
    control: Sender<Control>,
    pending: Mutex<Option<PendingReceivers>>,
}

impl MovieFileWriter {
    pub fn new(file_path: PathBuf, tracks: Vec<TrackSettings>, queue_depth: usize) -> Result<Self, WriteError> {
        let mut video = None;
        let mut audio = None;
        let mut video_rx = None;
        let mut audio_rx = None;

        for settings in &tracks {
            let (slot, rx_slot) = match settings.track() {
                Track::Video => (&mut video, &mut video_rx),
                Track::Audio => (&mut audio, &mut audio_rx),
            };
            if slot.is_some() {
                return Err(WriteError::OpenFailed(format!(
                    "duplicate {} track",
                    settings.track().as_str()
                )));
            }
            let (tx, rx) = bounded(queue_depth.max(1));
            *slot = Some(tx);
            *rx_slot = Some(rx);
        }

        if video.is_none() {
            return Err(WriteError::MissingTrack(Track::Video.as_str()));
        }

        let (control, control_rx) = unbounded();

        Ok(Self {
            file_path,
            tracks,
            status: Arc::new(Mutex::new(WriterStatus::Unknown)),
            origin: Arc::new(OnceLock::new()),
            accepting: Arc::new(AtomicBool::new(false)),
            video,
            audio,
            control,
            pending: Mutex::new(Some(PendingReceivers {
                video: video_rx,
                audio: audio_rx,
                control: control_rx,
            })),
        })
    }

    pub fn tracks(&self) -> &[TrackSettings] {
        &self.tracks
    }

    fn sender(&self, track: Track) -> Option<&Sender<SampleBuffer>> {
        match track {
            Track::Video => self.video.as_ref(),
            Track::Audio => self.audio.as_ref(),
        }
    }

    fn open_file(&self) -> io::Result<BufWriter<File>> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.file_path)?;
        let mut out = BufWriter::new(file);

        out.write_all(&movie_format::generate_file_header(self.tracks.len() as u16))?;
        for settings in &self.tracks {
            out.write_all(&movie_format::encode_track_descriptor(settings))?;
        }
        Ok(out)
    }
}

impl MovieWriter for MovieFileWriter {
    fn output_path(&self) -> &Path {
        &self.file_path
    }

    fn status(&self) -> WriterStatus {
        *self.status.lock()
    }

    fn start_writing(&self) -> Result<(), WriteError> {
        let receivers = self
            .pending
            .lock()
            .take()
            .ok_or_else(|| WriteError::OpenFailed("writer already started".into()))?;

        let out = self.open_file().map_err(|e| {
            *self.status.lock() = WriterStatus::Failed;
            WriteError::OpenFailed(format!("failed to create {}: {}", self.file_path.display(), e))
        })?;

        let context = LoopContext {
            file_path: self.file_path.clone(),
            status: Arc::clone(&self.status),
            origin: Arc::clone(&self.origin),
            accepting: Arc::clone(&self.accepting),
        };

        *self.status.lock() = WriterStatus::Writing;
        self.accepting.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("movie-writer".into())
            .spawn(move || write_loop(out, receivers, context))
            .map_err(|e| {
                self.accepting.store(false, Ordering::SeqCst);
                *self.status.lock() = WriterStatus::Failed;
                WriteError::OpenFailed(format!("failed to spawn writer thread: {}", e))
            })?;

        log::debug!("Movie writer opened at {}", self.file_path.display());
        Ok(())
    }

    fn start_session(&self, origin: MediaTime) {
        if self.origin.set(origin).is_err() {
            log::warn!("Movie session already started; ignoring origin {}", origin);
        }
    }

    fn is_ready_for_more_media_data(&self, track: Track) -> bool {
        self.accepting.load(Ordering::SeqCst) && self.sender(track).map(|tx| !tx.is_full()).unwrap_or(false)
    }

    fn append(&self, buffer: SampleBuffer) -> Result<(), WriteError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(WriteError::NotWriting);
        }
        let track = buffer.track();
        let sender = self.sender(track).ok_or(WriteError::MissingTrack(track.as_str()))?;
        sender.try_send(buffer).map_err(|e| match e {
            TrySendError::Full(_) => WriteError::NotReady(track.as_str()),
            TrySendError::Disconnected(_) => WriteError::NotWriting,
        })
    }

    fn finish_writing(&self, completion: FinishCallback) {
        if self.status() != WriterStatus::Writing || !self.accepting.swap(false, Ordering::SeqCst) {
            completion(Err(WriteError::FinalizeFailed(format!(
                "writer is not writing (status {:?})",
                self.status()
            ))));
            return;
        }

        if let Err(SendError(Control::Finish(completion))) = self.control.send(Control::Finish(completion)) {
            *self.status.lock() = WriterStatus::Failed;
            completion(Err(WriteError::FinalizeFailed("writer thread is gone".into())));
        }
    }

    fn cancel_writing(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let mut status = self.status.lock();
        match *status {
            WriterStatus::Unknown => *status = WriterStatus::Cancelled,
            WriterStatus::Writing => {
                drop(status);
                let _ = self.control.send(Control::Cancel);
            }
            _ => {}
        }
    }
}

struct LoopContext {
    file_path: PathBuf,
    status: Arc<Mutex<WriterStatus>>,
    origin: Arc<OnceLock<MediaTime>>,
    accepting: Arc<AtomicBool>,
}

#[derive(Default)]
struct LoopState {
    summary: MovieSummary,
    skipped_before_origin: u64,
    error: Option<String>,
}

fn write_loop(mut out: BufWriter<File>, receivers: PendingReceivers, context: LoopContext) {
    let video_rx = receivers.video.unwrap_or_else(never);
    let audio_rx = receivers.audio.unwrap_or_else(never);
    let control_rx = receivers.control;
    let mut state = LoopState::default();

    loop {
        select! {
            recv(control_rx) -> msg => match msg {
                Ok(Control::Finish(completion)) => {
                    while let Ok(buffer) = video_rx.try_recv() {
                        write_sample(&mut out, buffer, &context, &mut state);
                    }
                    while let Ok(buffer) = audio_rx.try_recv() {
                        write_sample(&mut out, buffer, &context, &mut state);
                    }
                    let outcome = finalize(out, &context, state);
                    *context.status.lock() = if outcome.is_ok() {
                        WriterStatus::Completed
                    } else {
                        WriterStatus::Failed
                    };
                    completion(outcome);
                    return;
                }
                Ok(Control::Cancel) | Err(_) => {
                    drop(out);
                    let _ = fs::remove_file(&context.file_path);
                    *context.status.lock() = WriterStatus::Cancelled;
                    log::info!("Movie writer cancelled: {}", context.file_path.display());
                    return;
                }
            },
            recv(video_rx) -> msg => {
                if let Ok(buffer) = msg {
                    write_sample(&mut out, buffer, &context, &mut state);
                }
            },
            recv(audio_rx) -> msg => {
                if let Ok(buffer) = msg {
                    write_sample(&mut out, buffer, &context, &mut state);
                }
            },
        }
    }
}

fn write_sample(out: &mut BufWriter<File>, buffer: SampleBuffer, context: &LoopContext, state: &mut LoopState) {
    if state.error.is_some() {
        return;
    }
    let Some(origin) = context.origin.get().copied() else {
        state.skipped_before_origin += 1;
        return;
    };

    let relative = buffer.presentation_time().relative_to(origin);
    if relative.is_negative() {
        // Earlier than the session start; the movie begins at the origin.
        state.skipped_before_origin += 1;
        return;
    }

    let track = buffer.track();
    let relative_nanos = relative.as_nanos();
    let payload = buffer.into_data();
    let header = movie_format::encode_sample_header(track, relative_nanos, payload.len() as u32);

    let result = out.write_all(&header).and_then(|_| out.write_all(&payload));
    if let Err(e) = result {
        log::error!("Failed to write {} sample: {}", track.as_str(), e);
        state.error = Some(e.to_string());
        context.accepting.store(false, Ordering::SeqCst);
        *context.status.lock() = WriterStatus::Failed;
        return;
    }

    match track {
        Track::Video => state.summary.video_samples += 1,
        Track::Audio => state.summary.audio_samples += 1,
    }
    state.summary.duration_nanos = state.summary.duration_nanos.max(relative_nanos);
}

fn finalize(out: BufWriter<File>, context: &LoopContext, mut state: LoopState) -> Result<FinishedMovie, WriteError> {
    let fail = |message: String| {
        let _ = fs::remove_file(&context.file_path);
        WriteError::FinalizeFailed(message)
    };

    if let Some(error) = state.error.take() {
        return Err(fail(format!("write failed: {}", error)));
    }
    let Some(origin) = context.origin.get().copied() else {
        return Err(fail("session was never started".into()));
    };
    if state.skipped_before_origin > 0 {
        log::debug!("Skipped {} samples earlier than the session origin", state.skipped_before_origin);
    }

    state.summary.origin_nanos = origin.as_nanos();

    let mut file = out
        .into_inner()
        .map_err(|e| fail(format!("flush failed: {}", e.error())))?;
    file.seek(SeekFrom::Start(movie_format::SUMMARY_OFFSET))
        .and_then(|_| file.write_all(&movie_format::encode_summary(&state.summary)))
        .and_then(|_| file.sync_all())
        .map_err(|e| fail(format!("failed to patch header: {}", e)))?;
    drop(file);

    let checksum = sha256_file(&context.file_path).map_err(|e| fail(format!("checksum failed: {}", e)))?;

    log::info!(
        "Movie finalized: {} ({} video, {} audio samples)",
        context.file_path.display(),
        state.summary.video_samples,
        state.summary.audio_samples
    );

    Ok(FinishedMovie {
        path: context.file_path.clone(),
        origin,
        duration: MediaTime::from_nanos(state.summary.duration_nanos),
        video_samples: state.summary.video_samples,
        audio_samples: state.summary.audio_samples,
        checksum,
    })
}

/// SHA-256 hex digest of a file, streamed.
fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
