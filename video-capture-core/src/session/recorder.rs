use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::config::RecorderConfiguration;
use crate::models::error::{CaptureError, WriteError};
use crate::models::media::{Dimensions, MediaTime, SampleBuffer, SamplePayload, Track};
use crate::models::recording_result::{MuteSegment, RecordingMetadata, RecordingResult, TrackSummary};
use crate::models::state::{RecordingState, WriteSessionStatus, WriterStatus};
use crate::storage::metadata;
use crate::traits::movie_storage::{FinishedMovie, MovieStorage, MovieWriter, TrackSettings};
use crate::traits::observers::RecorderObserver;
use crate::traits::photo_library::PhotoLibrary;
use crate::traits::sample_delegate::SampleSink;

type SharedObserver = Arc<RwLock<Option<Arc<dyn RecorderObserver>>>>;

/// Counters updated from the delivery threads without the session lock.
#[derive(Default)]
struct SessionStats {
    video_dropped: AtomicU64,
    audio_dropped: AtomicU64,
    mutes: Mutex<MuteTracker>,
}

impl SessionStats {
    fn dropped(&self, track: Track) -> &AtomicU64 {
        match track {
            Track::Video => &self.video_dropped,
            Track::Audio => &self.audio_dropped,
        }
    }
}

/// Collapses consecutive muted audio buffers into segments.
#[derive(Default)]
struct MuteTracker {
    segments: Vec<MuteSegment>,
    open: bool,
}

impl MuteTracker {
    fn record(&mut self, muted: bool, start_nanos: i64, end_nanos: i64) {
        if !muted {
            self.open = false;
            return;
        }
        match self.segments.last_mut() {
            Some(last) if self.open => last.end_nanos = last.end_nanos.max(end_nanos),
            _ => self.segments.push(MuteSegment {
                start_nanos,
                end_nanos,
            }),
        }
        self.open = true;
    }
}

/// One in-progress movie.
struct WriteSession {
    id: Uuid,
    path: PathBuf,
    created_at: DateTime<Utc>,
    writer: Option<Arc<dyn MovieWriter>>,
    origin: Option<MediaTime>,
    status: WriteSessionStatus,
    stats: Arc<SessionStats>,
}

impl WriteSession {
    fn new(config: &RecorderConfiguration) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            path: config
                .output_directory
                .join(format!("{}.{}", id, config.file_extension)),
            created_at: Utc::now(),
            writer: None,
            origin: None,
            status: WriteSessionStatus::NotStarted,
            stats: Arc::new(SessionStats::default()),
        }
    }
}

/// Internal mutable recorder state, protected by `parking_lot::Mutex`.
#[derive(Default)]
struct RecorderState {
    state: RecordingState,
    session: Option<WriteSession>,
    /// Dimensions of the most recent video frame, recording or not.
    latest_dimensions: Option<Dimensions>,
}

/// Where an accepted buffer goes once the lock is released.
struct AcceptTarget {
    writer: Arc<dyn MovieWriter>,
    origin: MediaTime,
    stats: Arc<SessionStats>,
}

/// The muxer: turns the two live sample streams into one movie file.
///
/// ```text
/// [video_output] ─┐                        ┌→ [video track] ─┐
///                 ├→ gate → origin → poll ─┤                 ├→ [MovieWriter] → [PhotoLibrary]
/// [audio_output] ─┘           (mute)       └→ [audio track] ─┘
/// ```
///
/// Session creation and origin assignment happen under one mutex; capacity
/// polling and appends happen outside it so the two delivery threads never
/// wait on each other.
pub struct Recorder<S: MovieStorage, L: PhotoLibrary> {
    config: RecorderConfiguration,
    storage: S,
    library: Arc<L>,
    inner: Arc<Mutex<RecorderState>>,
    audio_muted: AtomicBool,
    observer: SharedObserver,
}

impl<S: MovieStorage, L: PhotoLibrary + 'static> Recorder<S, L> {
    pub fn new(config: RecorderConfiguration, storage: S, library: Arc<L>) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            config,
            storage,
            library,
            inner: Arc::new(Mutex::new(RecorderState::default())),
            audio_muted: AtomicBool::new(false),
            observer: Arc::new(RwLock::new(None)),
        })
    }

    pub fn set_observer(&self, observer: Arc<dyn RecorderObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn config(&self) -> &RecorderConfiguration {
        &self.config
    }

    pub fn state(&self) -> RecordingState {
        self.inner.lock().state
    }

    /// Origin of the current write session, once the first buffer was accepted.
    pub fn current_origin(&self) -> Option<MediaTime> {
        self.inner.lock().session.as_ref().and_then(|s| s.origin)
    }

    pub fn write_status(&self) -> Option<WriteSessionStatus> {
        self.inner.lock().session.as_ref().map(|s| s.status)
    }

    pub fn audio_muted(&self) -> bool {
        self.audio_muted.load(Ordering::SeqCst)
    }

    /// Takes effect from the next accepted audio buffer.
    pub fn set_audio_muted(&self, muted: bool) {
        self.audio_muted.store(muted, Ordering::SeqCst);
    }

    /// Begin a recording. Transitions: idle → recording.
    ///
    /// The writer opens immediately when a video frame has been seen,
    /// otherwise on the first video frame.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if !inner.state.is_idle() {
            log::debug!("Ignoring start: recorder is {:?}", inner.state);
            return;
        }

        let mut session = WriteSession::new(&self.config);
        let latest = inner.latest_dimensions;
        match latest {
            Some(dimensions) => match self.open_writer(&session, dimensions) {
                Ok(writer) => {
                    session.writer = Some(writer);
                    session.status = WriteSessionStatus::Writing;
                }
                Err(e) => {
                    drop(inner);
                    log::error!("Failed to start recording: {}", e);
                    notify_error(&self.observer, &e.into());
                    return;
                }
            },
            None => log::debug!("No video frame yet; deferring writer setup"),
        }

        log::info!("Recording started: {}", session.path.display());
        inner.session = Some(session);
        inner.state = RecordingState::Recording;
        drop(inner);
        notify_state(&self.observer, RecordingState::Recording);
    }

    /// Suspend acceptance. Transitions: recording → paused.
    pub fn pause(&self) {
        self.transition(RecordingState::Recording, RecordingState::Paused);
    }

    /// Transitions: paused → recording. The origin is kept.
    pub fn resume(&self) {
        self.transition(RecordingState::Paused, RecordingState::Recording);
    }

    /// Finalize the movie and export it to the library.
    /// Transitions: recording/paused → stopping → idle.
    ///
    /// Returns immediately; the outcome arrives through the observer.
    pub fn stop(&self) {
        let (writer, context) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_active() {
                log::debug!("Ignoring stop: recorder is {:?}", inner.state);
                return;
            }
            inner.state = RecordingState::Stopping;

            let Some(session) = inner.session.as_mut() else {
                inner.state = RecordingState::Idle;
                return;
            };
            let writer = match (session.writer.clone(), session.origin) {
                (Some(writer), Some(_)) => Some(writer),
                (writer, _) => {
                    if let Some(writer) = writer {
                        writer.cancel_writing();
                    }
                    None
                }
            };
            session.status = WriteSessionStatus::Finishing;

            let context = FinishContext {
                inner: Arc::clone(&self.inner),
                observer: Arc::clone(&self.observer),
                library: Arc::clone(&self.library),
                write_metadata: self.config.write_metadata,
                id: session.id,
                created_at: session.created_at,
                stats: Arc::clone(&session.stats),
            };
            (writer, context)
        };
        notify_state(&self.observer, RecordingState::Stopping);

        match writer {
            Some(writer) => {
                let finished_writer = Arc::clone(&writer);
                writer.finish_writing(Box::new(move |outcome| {
                    let outcome = outcome.and_then(|movie| match finished_writer.status() {
                        WriterStatus::Completed => Ok(movie),
                        status => Err(WriteError::FinalizeFailed(format!(
                            "writer finished with status {:?}",
                            status
                        ))),
                    });
                    context.complete(outcome);
                }));
            }
            None => context.complete(Err(WriteError::NoVideoFrames)),
        }
    }

    /// Route one buffer by its track. No-op unless recording.
    pub fn accept(&self, buffer: SampleBuffer) {
        match buffer.track() {
            Track::Video => self.video_output(buffer),
            Track::Audio => self.audio_output(buffer),
        }
    }

    fn transition(&self, from: RecordingState, to: RecordingState) {
        {
            let mut inner = self.inner.lock();
            if inner.state != from {
                log::debug!("Ignoring {:?} request: recorder is {:?}", to, inner.state);
                return;
            }
            inner.state = to;
        }
        notify_state(&self.observer, to);
    }

    fn open_writer(&self, session: &WriteSession, dimensions: Dimensions) -> Result<Arc<dyn MovieWriter>, WriteError> {
        let tracks = [
            TrackSettings::video(dimensions, &self.config.video, self.config.expects_real_time),
            TrackSettings::audio(&self.config.audio, self.config.expects_real_time),
        ];
        let writer = self.storage.create_writer(&session.path, &tracks)?;
        if let Err(e) = writer.start_writing() {
            writer.cancel_writing();
            return Err(e);
        }
        log::debug!(
            "Movie writer ready: {}x{} at {}",
            dimensions.width,
            dimensions.height,
            session.path.display()
        );
        Ok(writer)
    }

    /// Gate a buffer under the session lock, opening the deferred writer and
    /// assigning the origin as needed.
    fn writable_target(&self, buffer: &SampleBuffer) -> Option<AcceptTarget> {
        let mut inner = self.inner.lock();

        if let Some(dimensions) = buffer.dimensions().filter(|d| !d.is_empty()) {
            inner.latest_dimensions = Some(dimensions);
        }
        if !inner.state.is_recording() {
            return None;
        }

        let session = inner.session.as_mut()?;

        if session.status == WriteSessionStatus::NotStarted {
            let dimensions = buffer.dimensions().filter(|d| !d.is_empty())?;
            match self.open_writer(session, dimensions) {
                Ok(writer) => {
                    session.writer = Some(writer);
                    session.status = WriteSessionStatus::Writing;
                }
                Err(e) => {
                    log::error!("Failed to open movie writer: {}", e);
                    inner.session = None;
                    inner.state = RecordingState::Idle;
                    drop(inner);
                    notify_state(&self.observer, RecordingState::Idle);
                    notify_error(&self.observer, &e.into());
                    return None;
                }
            }
        }

        if session.status != WriteSessionStatus::Writing {
            return None;
        }
        let writer = session.writer.clone()?;
        if writer.status() != WriterStatus::Writing {
            return None;
        }

        let origin = match session.origin {
            Some(origin) => origin,
            None => {
                let origin = buffer.presentation_time();
                session.origin = Some(origin);
                writer.start_session(origin);
                log::info!("Write session origin set at {}", origin);
                origin
            }
        };

        Some(AcceptTarget {
            writer,
            origin,
            stats: Arc::clone(&session.stats),
        })
    }

    fn append(&self, target: AcceptTarget, buffer: SampleBuffer) {
        let track = buffer.track();
        if !target.writer.is_ready_for_more_media_data(track) {
            target.stats.dropped(track).fetch_add(1, Ordering::Relaxed);
            log::trace!("{} track has no capacity; dropping buffer", track.as_str());
            return;
        }
        if let Err(e) = target.writer.append(buffer) {
            target.stats.dropped(track).fetch_add(1, Ordering::Relaxed);
            log::trace!("Append failed: {}", e);
        }
    }
}

impl<S: MovieStorage, L: PhotoLibrary + 'static> SampleSink for Recorder<S, L> {
    fn video_output(&self, buffer: SampleBuffer) {
        if let Some(target) = self.writable_target(&buffer) {
            self.append(target, buffer);
        }
    }

    fn audio_output(&self, mut buffer: SampleBuffer) {
        let Some(target) = self.writable_target(&buffer) else {
            return;
        };

        let muted = self.audio_muted();
        if muted {
            buffer.zero_payload();
        }
        let start = buffer.presentation_time().relative_to(target.origin).as_nanos();
        if start >= 0 {
            let end = start + audio_duration_nanos(&buffer);
            target.stats.mutes.lock().record(muted, start, end);
        }

        self.append(target, buffer);
    }
}

fn audio_duration_nanos(buffer: &SampleBuffer) -> i64 {
    match buffer.payload() {
        SamplePayload::Audio(block) if block.sample_rate > 0 => {
            block.frame_count as i64 * 1_000_000_000 / block.sample_rate as i64
        }
        _ => 0,
    }
}

/// Everything the finalization callback needs, detached from the recorder.
struct FinishContext<L: PhotoLibrary> {
    inner: Arc<Mutex<RecorderState>>,
    observer: SharedObserver,
    library: Arc<L>,
    write_metadata: bool,
    id: Uuid,
    created_at: DateTime<Utc>,
    stats: Arc<SessionStats>,
}

impl<L: PhotoLibrary + 'static> FinishContext<L> {
    /// Clear the session, then export on success. Never retries.
    fn complete(self, outcome: Result<FinishedMovie, WriteError>) {
        {
            let mut inner = self.inner.lock();
            inner.session = None;
            inner.state = RecordingState::Idle;
        }
        notify_state(&self.observer, RecordingState::Idle);

        let movie = match outcome {
            Ok(movie) => movie,
            Err(e) => {
                log::error!("Recording failed: {}", e);
                notify_error(&self.observer, &e.into());
                return;
            }
        };

        let metadata = self.metadata(&movie);
        if self.write_metadata {
            if let Err(e) = metadata::write_metadata(&metadata, &movie.path) {
                log::warn!("Failed to write metadata sidecar: {}", e);
            }
        }

        let observer = Arc::clone(&self.observer);
        let origin = movie.origin;
        let checksum = movie.checksum.clone();
        let temp_path = movie.path.clone();

        self.library.save_video(
            &movie.path,
            Box::new(move |saved| match saved {
                Ok(library_path) => {
                    let mut metadata = metadata;
                    metadata.file_path = library_path.to_string_lossy().into_owned();
                    let result = RecordingResult {
                        file_path: library_path,
                        origin,
                        duration_secs: metadata.duration_secs,
                        metadata,
                        checksum,
                    };
                    log::info!("Recording saved: {}", result.file_path.display());
                    if let Some(observer) = observer.read().as_ref() {
                        observer.on_recording_saved(&result);
                    }
                }
                Err(e) => {
                    log::error!("Export failed, movie kept at {}: {}", temp_path.display(), e);
                    notify_error(&observer, &e.into());
                }
            }),
        );
    }

    fn metadata(&self, movie: &FinishedMovie) -> RecordingMetadata {
        let tracks = [Track::Video, Track::Audio]
            .into_iter()
            .map(|track| TrackSummary {
                track,
                written: movie.samples(track),
                dropped: self.stats.dropped(track).load(Ordering::Relaxed),
            })
            .collect();

        RecordingMetadata {
            id: self.id.to_string(),
            created_at: self.created_at.to_rfc3339(),
            duration_secs: movie.duration.as_secs_f64(),
            origin_nanos: movie.origin.as_nanos(),
            file_path: movie.path.to_string_lossy().into_owned(),
            checksum: movie.checksum.clone(),
            tracks,
            muted_segments: self.stats.mutes.lock().segments.clone(),
        }
    }
}

fn notify_state(observer: &SharedObserver, state: RecordingState) {
    if let Some(observer) = observer.read().as_ref() {
        observer.on_state_changed(state);
    }
}

fn notify_error(observer: &SharedObserver, error: &CaptureError) {
    if let Some(observer) = observer.read().as_ref() {
        observer.on_error(error);
    }
}
