//! In-crate test doubles for the backend, storage, library and observers.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::device::{Device, DeviceKind, DevicePosition, SessionPreset, TorchMode};
use crate::models::error::{CaptureError, ExportError, WriteError};
use crate::models::gallery::Thumbnail;
use crate::models::media::{AudioBlock, Dimensions, MediaTime, PixelBuffer, PixelFormat, SampleBuffer, Track};
use crate::models::orientation::CaptureOrientation;
use crate::models::recording_result::RecordingResult;
use crate::models::state::{RecordingState, WriterStatus};
use crate::traits::capture_backend::{CaptureBackend, DeliveryConnection};
use crate::traits::movie_storage::{FinishCallback, FinishedMovie, MovieStorage, MovieWriter, TrackSettings};
use crate::traits::observers::{GalleryObserver, RecorderObserver, SessionObserver};
use crate::traits::photo_library::{ExportCallback, PhotoLibrary};
use crate::traits::sample_delegate::{SampleBufferDelegate, SampleSink};

pub const FRAME_DIMENSIONS: Dimensions = Dimensions { width: 4, height: 2 };

pub fn video_buffer(nanos: i64) -> SampleBuffer {
    video_buffer_sized(nanos, FRAME_DIMENSIONS)
}

pub fn video_buffer_sized(nanos: i64, dimensions: Dimensions) -> SampleBuffer {
    let len = dimensions.width as usize * dimensions.height as usize * 4;
    SampleBuffer::video(
        MediaTime::from_nanos(nanos),
        PixelBuffer::packed(dimensions, PixelFormat::Bgra32, vec![1; len]),
    )
}

/// 10 ms of mono audio with non-zero payload.
pub fn audio_buffer(nanos: i64) -> SampleBuffer {
    SampleBuffer::audio(
        MediaTime::from_nanos(nanos),
        AudioBlock {
            sample_rate: 44_100,
            channels: 1,
            frame_count: 441,
            data: vec![0x11; 882],
        },
    )
}

/// Poll `condition` for up to two seconds.
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

// --- Delivery ---

pub struct MockConnection {
    track: Track,
    orientation: Mutex<CaptureOrientation>,
    updates: AtomicUsize,
}

impl MockConnection {
    pub fn new(track: Track) -> Self {
        Self {
            track,
            orientation: Mutex::new(CaptureOrientation::Portrait),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn orientation_updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl DeliveryConnection for MockConnection {
    fn track(&self) -> Track {
        self.track
    }

    fn set_video_orientation(&self, orientation: CaptureOrientation) {
        *self.orientation.lock() = orientation;
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn video_orientation(&self) -> CaptureOrientation {
        *self.orientation.lock()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    video: Mutex<Vec<SampleBuffer>>,
    audio: Mutex<Vec<SampleBuffer>>,
}

impl RecordingSink {
    pub fn video_times(&self) -> Vec<i64> {
        self.video.lock().iter().map(|b| b.presentation_time().as_nanos()).collect()
    }

    pub fn audio_times(&self) -> Vec<i64> {
        self.audio.lock().iter().map(|b| b.presentation_time().as_nanos()).collect()
    }
}

impl SampleSink for RecordingSink {
    fn video_output(&self, buffer: SampleBuffer) {
        self.video.lock().push(buffer);
    }

    fn audio_output(&self, buffer: SampleBuffer) {
        self.audio.lock().push(buffer);
    }
}

impl SampleBufferDelegate for RecordingSink {
    fn did_output(&self, buffer: SampleBuffer, _connection: &dyn DeliveryConnection) {
        match buffer.track() {
            Track::Video => self.video_output(buffer),
            Track::Audio => self.audio_output(buffer),
        }
    }
}

// --- Backend ---

#[derive(Default)]
struct BackendState {
    inputs: Vec<Device>,
    outputs: HashMap<Track, Arc<dyn SampleBufferDelegate>>,
    running: bool,
    preset: Option<SessionPreset>,
    locked: HashSet<String>,
    lock_count: usize,
    torch: HashMap<String, TorchMode>,
    rejected_inputs: HashSet<String>,
    reject_outputs: bool,
    fail_lock: bool,
    events: Vec<String>,
}

/// Scriptable capture backend. Delivery happens only through `deliver`.
pub struct MockBackend {
    devices: Vec<Device>,
    state: Mutex<BackendState>,
    video_connection: MockConnection,
    audio_connection: MockConnection,
}

impl MockBackend {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            state: Mutex::new(BackendState::default()),
            video_connection: MockConnection::new(Track::Video),
            audio_connection: MockConnection::new(Track::Audio),
        }
    }

    /// Back camera with torch, front camera, one microphone.
    pub fn phone() -> Self {
        Self::new(vec![
            Device::camera("back", "Back Camera", DevicePosition::Back, true),
            Device::camera("front", "Front Camera", DevicePosition::Front, false),
            Device::microphone("mic", "Built-in Microphone"),
        ])
    }

    pub fn device(&self, id: &str) -> Device {
        self.devices.iter().find(|d| d.id == id).cloned().unwrap()
    }

    pub fn reject_input(&self, id: &str) {
        self.state.lock().rejected_inputs.insert(id.to_string());
    }

    pub fn reject_outputs(&self) {
        self.state.lock().reject_outputs = true;
    }

    pub fn fail_lock(&self) {
        self.state.lock().fail_lock = true;
    }

    pub fn input_ids(&self) -> Vec<String> {
        self.state.lock().inputs.iter().map(|d| d.id.clone()).collect()
    }

    pub fn has_output(&self, track: Track) -> bool {
        self.state.lock().outputs.contains_key(&track)
    }

    pub fn preset(&self) -> Option<SessionPreset> {
        self.state.lock().preset
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.state.lock().locked.contains(id)
    }

    pub fn lock_count(&self) -> usize {
        self.state.lock().lock_count
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn video_connection(&self) -> &MockConnection {
        &self.video_connection
    }

    /// Push a buffer through the registered output of its track.
    pub fn deliver(&self, buffer: SampleBuffer) {
        let track = buffer.track();
        let delegate = self.state.lock().outputs.get(&track).cloned();
        let connection = match track {
            Track::Video => &self.video_connection,
            Track::Audio => &self.audio_connection,
        };
        if let Some(delegate) = delegate {
            delegate.did_output(buffer, connection);
        }
    }
}

impl CaptureBackend for MockBackend {
    fn devices(&self, kind: DeviceKind) -> Vec<Device> {
        self.devices.iter().filter(|d| d.kind == kind).cloned().collect()
    }

    fn set_preset(&self, preset: SessionPreset) -> Result<(), CaptureError> {
        self.state.lock().preset = Some(preset);
        Ok(())
    }

    fn add_input(&self, device: &Device) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.rejected_inputs.contains(&device.id) {
            return Err(CaptureError::InputRejected(device.id.clone()));
        }
        if state.inputs.iter().any(|d| d.kind == device.kind) {
            return Err(CaptureError::InputRejected(format!("{:?} input already present", device.kind)));
        }
        state.inputs.push(device.clone());
        state.events.push(format!("add:{}", device.id));
        Ok(())
    }

    fn remove_input(&self, device: &Device) {
        let mut state = self.state.lock();
        state.inputs.retain(|d| d.id != device.id);
        state.events.push(format!("remove:{}", device.id));
    }

    fn add_output(&self, track: Track, delegate: Arc<dyn SampleBufferDelegate>) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.reject_outputs {
            return Err(CaptureError::OutputRejected(track.as_str().into()));
        }
        state.outputs.insert(track, delegate);
        Ok(())
    }

    fn remove_output(&self, track: Track) {
        self.state.lock().outputs.remove(&track);
    }

    fn start_running(&self) {
        let mut state = self.state.lock();
        state.running = true;
        state.events.push("start".into());
    }

    fn stop_running(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.events.push("stop".into());
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn lock_for_configuration(&self, device: &Device) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.fail_lock {
            return Err(CaptureError::ConfigurationLocked(device.id.clone()));
        }
        state.locked.insert(device.id.clone());
        state.lock_count += 1;
        Ok(())
    }

    fn unlock_for_configuration(&self, device: &Device) {
        self.state.lock().locked.remove(&device.id);
    }

    fn torch_mode(&self, device: &Device) -> TorchMode {
        self.state.lock().torch.get(&device.id).copied().unwrap_or_default()
    }

    fn is_torch_mode_supported(&self, device: &Device, _mode: TorchMode) -> bool {
        device.has_torch
    }

    fn set_torch_mode(&self, device: &Device, mode: TorchMode) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if !state.locked.contains(&device.id) {
            return Err(CaptureError::ConfigurationLocked(format!("{} is not locked", device.id)));
        }
        state.torch.insert(device.id.clone(), mode);
        Ok(())
    }
}

// --- Storage ---

/// Writer that records appends in memory and finishes synchronously.
pub struct MockWriter {
    path: PathBuf,
    tracks: Vec<TrackSettings>,
    status: Mutex<WriterStatus>,
    origin: Mutex<Option<MediaTime>>,
    session_starts: AtomicUsize,
    appended: Mutex<Vec<SampleBuffer>>,
    video_ready: AtomicBool,
    audio_ready: AtomicBool,
    fail_finish: AtomicBool,
}

impl MockWriter {
    fn new(path: &Path, tracks: &[TrackSettings]) -> Self {
        Self {
            path: path.to_path_buf(),
            tracks: tracks.to_vec(),
            status: Mutex::new(WriterStatus::Unknown),
            origin: Mutex::new(None),
            session_starts: AtomicUsize::new(0),
            appended: Mutex::new(Vec::new()),
            video_ready: AtomicBool::new(true),
            audio_ready: AtomicBool::new(true),
            fail_finish: AtomicBool::new(false),
        }
    }

    pub fn tracks(&self) -> &[TrackSettings] {
        &self.tracks
    }

    pub fn origin(&self) -> Option<MediaTime> {
        *self.origin.lock()
    }

    pub fn session_starts(&self) -> usize {
        self.session_starts.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, track: Track, ready: bool) {
        match track {
            Track::Video => self.video_ready.store(ready, Ordering::SeqCst),
            Track::Audio => self.audio_ready.store(ready, Ordering::SeqCst),
        }
    }

    pub fn fail_finish(&self) {
        self.fail_finish.store(true, Ordering::SeqCst);
    }

    pub fn appended(&self, track: Track) -> Vec<SampleBuffer> {
        self.appended.lock().iter().filter(|b| b.track() == track).cloned().collect()
    }

    pub fn appended_times(&self, track: Track) -> Vec<i64> {
        self.appended(track)
            .iter()
            .map(|b| b.presentation_time().as_nanos())
            .collect()
    }
}

impl MovieWriter for MockWriter {
    fn output_path(&self) -> &Path {
        &self.path
    }

    fn status(&self) -> WriterStatus {
        *self.status.lock()
    }

    fn start_writing(&self) -> Result<(), WriteError> {
        *self.status.lock() = WriterStatus::Writing;
        Ok(())
    }

    fn start_session(&self, origin: MediaTime) {
        self.session_starts.fetch_add(1, Ordering::SeqCst);
        self.origin.lock().get_or_insert(origin);
    }

    fn is_ready_for_more_media_data(&self, track: Track) -> bool {
        self.status() == WriterStatus::Writing
            && match track {
                Track::Video => self.video_ready.load(Ordering::SeqCst),
                Track::Audio => self.audio_ready.load(Ordering::SeqCst),
            }
    }

    fn append(&self, buffer: SampleBuffer) -> Result<(), WriteError> {
        if self.status() != WriterStatus::Writing {
            return Err(WriteError::NotWriting);
        }
        self.appended.lock().push(buffer);
        Ok(())
    }

    fn finish_writing(&self, completion: FinishCallback) {
        if self.fail_finish.load(Ordering::SeqCst) {
            *self.status.lock() = WriterStatus::Failed;
            completion(Err(WriteError::FinalizeFailed("disk full".into())));
            return;
        }

        let origin = self.origin().unwrap_or(MediaTime::ZERO);
        let appended = self.appended.lock().clone();
        let last = appended
            .iter()
            .map(|b| b.presentation_time().relative_to(origin).as_nanos())
            .max()
            .unwrap_or(0);
        *self.status.lock() = WriterStatus::Completed;
        completion(Ok(FinishedMovie {
            path: self.path.clone(),
            origin,
            duration: MediaTime::from_nanos(last),
            video_samples: appended.iter().filter(|b| b.track() == Track::Video).count() as u64,
            audio_samples: appended.iter().filter(|b| b.track() == Track::Audio).count() as u64,
            checksum: "0".repeat(64),
        }));
    }

    fn cancel_writing(&self) {
        *self.status.lock() = WriterStatus::Cancelled;
    }
}

#[derive(Default)]
pub struct MockStorage {
    writers: Mutex<Vec<Arc<MockWriter>>>,
    fail_open: AtomicBool,
}

impl MockStorage {
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn writer_count(&self) -> usize {
        self.writers.lock().len()
    }

    pub fn last_writer(&self) -> Option<Arc<MockWriter>> {
        self.writers.lock().last().cloned()
    }
}

impl MovieStorage for MockStorage {
    fn create_writer(&self, path: &Path, tracks: &[TrackSettings]) -> Result<Arc<dyn MovieWriter>, WriteError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(WriteError::OpenFailed("storage unavailable".into()));
        }
        let writer = Arc::new(MockWriter::new(path, tracks));
        self.writers.lock().push(Arc::clone(&writer));
        Ok(writer)
    }
}

// --- Library ---

/// Library that "saves" instantly and serves a canned thumbnail.
#[derive(Default)]
pub struct MockLibrary {
    saved: Mutex<Vec<PathBuf>>,
    fail_save: AtomicBool,
    thumbnail: Mutex<Option<Thumbnail>>,
    thumbnail_requests: Mutex<Vec<Dimensions>>,
}

impl MockLibrary {
    pub fn fail_save(&self) {
        self.fail_save.store(true, Ordering::SeqCst);
    }

    pub fn set_thumbnail(&self, thumbnail: Thumbnail) {
        *self.thumbnail.lock() = Some(thumbnail);
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().clone()
    }

    pub fn thumbnail_requests(&self) -> Vec<Dimensions> {
        self.thumbnail_requests.lock().clone()
    }
}

impl PhotoLibrary for MockLibrary {
    fn save_video(&self, path: &Path, completion: ExportCallback) {
        if self.fail_save.load(Ordering::SeqCst) {
            completion(Err(ExportError::SaveFailed("library full".into())));
            return;
        }
        self.saved.lock().push(path.to_path_buf());
        let name = path.file_name().map(PathBuf::from).unwrap_or_default();
        completion(Ok(Path::new("/library").join(name)));
    }

    fn latest_thumbnail(&self, size: Dimensions) -> Result<Option<Thumbnail>, CaptureError> {
        self.thumbnail_requests.lock().push(size);
        Ok(self.thumbnail.lock().clone())
    }
}

// --- Observers ---

/// Observer for every component that records what it was told.
#[derive(Default)]
pub struct RecordingObserver {
    pub states: Mutex<Vec<RecordingState>>,
    pub saved: Mutex<Vec<RecordingResult>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub switched: Mutex<Vec<DevicePosition>>,
    pub running: Mutex<Vec<bool>>,
    pub thumbnails: Mutex<Vec<Thumbnail>>,
}

impl RecorderObserver for RecordingObserver {
    fn on_state_changed(&self, state: RecordingState) {
        self.states.lock().push(state);
    }

    fn on_recording_saved(&self, result: &RecordingResult) {
        self.saved.lock().push(result.clone());
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }
}

impl SessionObserver for RecordingObserver {
    fn on_camera_switched(&self, position: DevicePosition) {
        self.switched.lock().push(position);
    }

    fn on_running_changed(&self, running: bool) {
        self.running.lock().push(running);
    }
}

impl GalleryObserver for RecordingObserver {
    fn on_last_gallery_image(&self, thumbnail: &Thumbnail) {
        self.thumbnails.lock().push(thumbnail.clone());
    }
}
