use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use video_capture_core::{
    CaptureBackend, CaptureError, CaptureOrientation, DeliveryConnection, Device, DeviceKind, DevicePosition,
    Dimensions, MediaTime, SampleBuffer, SampleBufferDelegate, SessionPreset, TorchMode, Track,
};

use crate::frames::{synthetic_audio_block, synthetic_video_frame};

/// Delivery rates of the simulated hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedFormat {
    pub frame_rate: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per delivered audio block.
    pub audio_block_frames: u32,
}

impl Default for SimulatedFormat {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            sample_rate: 44_100,
            channels: 1,
            audio_block_frames: 1024,
        }
    }
}

/// Sensor mode the simulated cameras produce for a preset.
pub fn preset_dimensions(preset: SessionPreset) -> Dimensions {
    match preset {
        SessionPreset::Low => Dimensions::new(192, 144),
        SessionPreset::Medium => Dimensions::new(480, 360),
        SessionPreset::High | SessionPreset::Photo => Dimensions::new(640, 480),
        SessionPreset::Hd1280x720 => Dimensions::new(1280, 720),
        SessionPreset::Hd1920x1080 => Dimensions::new(1920, 1080),
        SessionPreset::Hd3840x2160 => Dimensions::new(3840, 2160),
    }
}

/// Delivery path of one track. Holds the orientation the consumer applies.
pub struct SimConnection {
    track: Track,
    orientation: Mutex<CaptureOrientation>,
}

impl SimConnection {
    fn new(track: Track) -> Self {
        Self {
            track,
            orientation: Mutex::new(CaptureOrientation::default()),
        }
    }
}

impl DeliveryConnection for SimConnection {
    fn track(&self) -> Track {
        self.track
    }

    fn set_video_orientation(&self, orientation: CaptureOrientation) {
        *self.orientation.lock() = orientation;
    }

    fn video_orientation(&self) -> CaptureOrientation {
        *self.orientation.lock()
    }
}

#[derive(Default)]
struct Graph {
    inputs: Vec<Device>,
    outputs: HashMap<Track, Arc<dyn SampleBufferDelegate>>,
    preset: SessionPreset,
    locked: HashSet<String>,
    torch: HashMap<String, TorchMode>,
    rejected_inputs: HashSet<String>,
}

impl Graph {
    fn has_input(&self, kind: DeviceKind) -> bool {
        self.inputs.iter().any(|d| d.kind == kind)
    }
}

/// State shared between the backend and its delivery threads.
struct Delivery {
    graph: Mutex<Graph>,
    running: AtomicBool,
    clock: Instant,
    video_connection: SimConnection,
    audio_connection: SimConnection,
    video_delivered: AtomicU64,
    audio_delivered: AtomicU64,
}

impl Delivery {
    /// Host clock shared by both tracks, like real capture hardware.
    fn now(&self) -> MediaTime {
        MediaTime::from_nanos(self.clock.elapsed().as_nanos() as i64)
    }

    fn connection(&self, track: Track) -> &SimConnection {
        match track {
            Track::Video => &self.video_connection,
            Track::Audio => &self.audio_connection,
        }
    }

    fn counter(&self, track: Track) -> &AtomicU64 {
        match track {
            Track::Video => &self.video_delivered,
            Track::Audio => &self.audio_delivered,
        }
    }

    /// Hands `buffer` to the registered output. The graph lock is released
    /// before the delegate runs.
    fn push(&self, buffer: SampleBuffer) -> bool {
        let track = buffer.track();
        let delegate = self.graph.lock().outputs.get(&track).cloned();
        match delegate {
            Some(delegate) => {
                delegate.did_output(buffer, self.connection(track));
                self.counter(track).fetch_add(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Output registered and a source device attached for `kind`.
    fn source_ready(&self, kind: DeviceKind, track: Track) -> bool {
        let graph = self.graph.lock();
        graph.has_input(kind) && graph.outputs.contains_key(&track)
    }
}

/// Capture backend with synthetic cameras and a synthetic microphone.
///
/// Mirrors real hardware closely enough to drive the whole pipeline: one
/// delivery thread per track, a shared host clock for timestamps, per-device
/// configuration locks and a torch on cameras that have one. Buffers can also
/// be injected with [`SimulatedBackend::deliver`] for deterministic timing.
pub struct SimulatedBackend {
    devices: Vec<Device>,
    format: SimulatedFormat,
    delivery: Arc<Delivery>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl SimulatedBackend {
    pub fn new(devices: Vec<Device>, format: SimulatedFormat) -> Self {
        Self {
            devices,
            format,
            delivery: Arc::new(Delivery {
                graph: Mutex::new(Graph::default()),
                running: AtomicBool::new(false),
                clock: Instant::now(),
                video_connection: SimConnection::new(Track::Video),
                audio_connection: SimConnection::new(Track::Audio),
                video_delivered: AtomicU64::new(0),
                audio_delivered: AtomicU64::new(0),
            }),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Back camera with torch, front camera, built-in microphone.
    pub fn phone() -> Self {
        Self::new(
            vec![
                Device::camera("sim-back", "Back Camera", DevicePosition::Back, true),
                Device::camera("sim-front", "Front Camera", DevicePosition::Front, false),
                Device::microphone("sim-mic", "Built-in Microphone"),
            ],
            SimulatedFormat::default(),
        )
    }

    pub fn format(&self) -> SimulatedFormat {
        self.format
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices.iter().find(|d| d.id == id).cloned()
    }

    /// Makes every later `add_input` for `id` fail.
    pub fn reject_input(&self, id: &str) {
        self.delivery.graph.lock().rejected_inputs.insert(id.to_string());
    }

    pub fn active_inputs(&self) -> Vec<Device> {
        self.delivery.graph.lock().inputs.clone()
    }

    pub fn preset(&self) -> SessionPreset {
        self.delivery.graph.lock().preset
    }

    pub fn is_locked(&self, device: &Device) -> bool {
        self.delivery.graph.lock().locked.contains(&device.id)
    }

    pub fn connection(&self, track: Track) -> &dyn DeliveryConnection {
        self.delivery.connection(track)
    }

    /// Buffers handed to the output of `track` so far.
    pub fn delivered(&self, track: Track) -> u64 {
        self.delivery.counter(track).load(Ordering::SeqCst)
    }

    /// Current reading of the host clock that stamps delivered buffers.
    pub fn clock(&self) -> MediaTime {
        self.delivery.now()
    }

    /// Injects a buffer on the calling thread. Returns false when no output
    /// is registered for its track.
    pub fn deliver(&self, buffer: SampleBuffer) -> bool {
        self.delivery.push(buffer)
    }

    fn spawn_delivery(&self, name: &str, track: Track) -> Result<JoinHandle<()>, CaptureError> {
        let delivery = Arc::clone(&self.delivery);
        let format = self.format;

        thread::Builder::new()
            .name(name.into())
            .spawn(move || match track {
                Track::Video => video_delivery_loop(delivery, format),
                Track::Audio => audio_delivery_loop(delivery, format),
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn {} thread: {}", name, e)))
    }
}

impl CaptureBackend for SimulatedBackend {
    fn devices(&self, kind: DeviceKind) -> Vec<Device> {
        self.devices.iter().filter(|d| d.kind == kind).cloned().collect()
    }

    fn set_preset(&self, preset: SessionPreset) -> Result<(), CaptureError> {
        self.delivery.graph.lock().preset = preset;
        log::debug!("Simulated preset: {:?} ({:?})", preset, preset_dimensions(preset));
        Ok(())
    }

    fn add_input(&self, device: &Device) -> Result<(), CaptureError> {
        if !self.devices.contains(device) {
            return Err(CaptureError::DeviceNotAvailable(device.id.clone()));
        }

        let mut graph = self.delivery.graph.lock();
        if graph.rejected_inputs.contains(&device.id) {
            return Err(CaptureError::InputRejected(device.id.clone()));
        }
        if graph.has_input(device.kind) {
            return Err(CaptureError::InputRejected(format!("{:?} input already present", device.kind)));
        }
        graph.inputs.push(device.clone());
        log::debug!("Simulated input added: {}", device.name);
        Ok(())
    }

    fn remove_input(&self, device: &Device) {
        self.delivery.graph.lock().inputs.retain(|d| d.id != device.id);
    }

    fn add_output(&self, track: Track, delegate: Arc<dyn SampleBufferDelegate>) -> Result<(), CaptureError> {
        let mut graph = self.delivery.graph.lock();
        if graph.outputs.contains_key(&track) {
            return Err(CaptureError::OutputRejected(format!("{} output already attached", track.as_str())));
        }
        graph.outputs.insert(track, delegate);
        Ok(())
    }

    fn remove_output(&self, track: Track) {
        self.delivery.graph.lock().outputs.remove(&track);
    }

    fn start_running(&self) {
        if self.delivery.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut threads = self.threads.lock();
        for (name, track) in [("video-delivery", Track::Video), ("audio-delivery", Track::Audio)] {
            match self.spawn_delivery(name, track) {
                Ok(handle) => threads.push(handle),
                Err(e) => log::error!("Simulated capture failed to start: {}", e),
            }
        }
        log::info!("Simulated capture running");
    }

    fn stop_running(&self) {
        self.delivery.running.store(false, Ordering::SeqCst);
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            let _ = handle.join();
        }
        log::info!("Simulated capture stopped");
    }

    fn is_running(&self) -> bool {
        self.delivery.running.load(Ordering::SeqCst)
    }

    fn lock_for_configuration(&self, device: &Device) -> Result<(), CaptureError> {
        if !self.devices.contains(device) {
            return Err(CaptureError::DeviceNotAvailable(device.id.clone()));
        }
        let mut graph = self.delivery.graph.lock();
        if !graph.locked.insert(device.id.clone()) {
            return Err(CaptureError::ConfigurationLocked(device.id.clone()));
        }
        Ok(())
    }

    fn unlock_for_configuration(&self, device: &Device) {
        self.delivery.graph.lock().locked.remove(&device.id);
    }

    fn torch_mode(&self, device: &Device) -> TorchMode {
        self.delivery.graph.lock().torch.get(&device.id).copied().unwrap_or_default()
    }

    fn is_torch_mode_supported(&self, device: &Device, _mode: TorchMode) -> bool {
        device.has_torch
    }

    fn set_torch_mode(&self, device: &Device, mode: TorchMode) -> Result<(), CaptureError> {
        if !device.has_torch {
            return Err(CaptureError::Unsupported(format!("{} has no torch", device.name)));
        }
        let mut graph = self.delivery.graph.lock();
        if !graph.locked.contains(&device.id) {
            return Err(CaptureError::ConfigurationLocked(format!("{} is not locked", device.id)));
        }
        graph.torch.insert(device.id.clone(), mode);
        Ok(())
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        self.stop_running();
    }
}

fn video_delivery_loop(delivery: Arc<Delivery>, format: SimulatedFormat) {
    let interval = Duration::from_secs_f64(1.0 / format.frame_rate.max(1) as f64);
    let mut frame_number = 0u64;

    while delivery.running.load(Ordering::SeqCst) {
        let deadline = Instant::now() + interval;

        if delivery.source_ready(DeviceKind::Camera, Track::Video) {
            let dimensions = preset_dimensions(delivery.graph.lock().preset);
            let pixels = synthetic_video_frame(frame_number, dimensions);
            if delivery.push(SampleBuffer::video(delivery.now(), pixels)) {
                frame_number += 1;
            }
        }

        thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }
    log::trace!("Video delivery ended after {} frames", frame_number);
}

fn audio_delivery_loop(delivery: Arc<Delivery>, format: SimulatedFormat) {
    let interval = Duration::from_secs_f64(format.audio_block_frames as f64 / format.sample_rate.max(1) as f64);
    let mut block_number = 0u64;

    while delivery.running.load(Ordering::SeqCst) {
        let deadline = Instant::now() + interval;

        if delivery.source_ready(DeviceKind::Microphone, Track::Audio) {
            let block = synthetic_audio_block(
                block_number,
                format.sample_rate,
                format.channels,
                format.audio_block_frames,
            );
            if delivery.push(SampleBuffer::audio(delivery.now(), block)) {
                block_number += 1;
            }
        }

        thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }
    log::trace!("Audio delivery ended after {} blocks", block_number);
}
