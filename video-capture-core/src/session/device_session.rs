use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::models::device::{Device, DeviceKind, DevicePosition, SessionPreset, TorchMode};
use crate::models::error::{CaptureError, SetupError, SwitchError, TorchError};
use crate::models::media::Track;
use crate::session::session_queue::SessionQueue;
use crate::traits::capture_backend::{CaptureBackend, ConfigurationLock};
use crate::traits::observers::SessionObserver;
use crate::traits::sample_delegate::SampleBufferDelegate;

/// The capture graph as this session has built it.
#[derive(Debug, Default)]
struct SessionGraph {
    video_input: Option<Device>,
    audio_input: Option<Device>,
    outputs_attached: bool,
    preset: SessionPreset,
}

impl SessionGraph {
    fn is_configured(&self) -> bool {
        self.video_input.is_some() || self.outputs_attached
    }

    fn slot(&mut self, kind: DeviceKind) -> &mut Option<Device> {
        match kind {
            DeviceKind::Camera => &mut self.video_input,
            DeviceKind::Microphone => &mut self.audio_input,
        }
    }
}

struct Shared<B: CaptureBackend> {
    backend: Arc<B>,
    graph: Mutex<SessionGraph>,
    observer: RwLock<Option<Arc<dyn SessionObserver>>>,
}

impl<B: CaptureBackend> Shared<B> {
    fn start_running(&self) {
        if self.backend.is_running() {
            return;
        }
        self.backend.start_running();
        log::info!("Capture session running");
        self.notify(|o| o.on_running_changed(true));
    }

    fn stop_running(&self) {
        if !self.backend.is_running() {
            return;
        }
        self.backend.stop_running();
        log::info!("Capture session stopped");
        self.notify(|o| o.on_running_changed(false));
    }

    fn notify(&self, f: impl FnOnce(&dyn SessionObserver)) {
        if let Some(observer) = self.observer.read().as_ref() {
            f(observer.as_ref());
        }
    }

    /// Swap the input of `new`'s kind. The session is stopped around the
    /// change; if the backend rejects `new`, the previous input is restored.
    fn replace_input(&self, graph: &mut SessionGraph, new: Device) -> Result<(), CaptureError> {
        let was_running = self.backend.is_running();
        if was_running {
            self.backend.stop_running();
        }

        let slot = graph.slot(new.kind);
        if let Some(old) = slot.as_ref() {
            self.backend.remove_input(old);
        }

        let outcome = match self.backend.add_input(&new) {
            Ok(()) => {
                log::info!("Input changed to {}", new.name);
                *slot = Some(new);
                Ok(())
            }
            Err(e) => {
                log::warn!("Input {} rejected: {}", new.name, e);
                if let Some(old) = slot.as_ref() {
                    if let Err(restore) = self.backend.add_input(old) {
                        log::error!("Failed to restore input {}: {}", old.name, restore);
                        *slot = None;
                    }
                }
                Err(e)
            }
        };

        if was_running {
            self.backend.start_running();
        }
        outcome
    }

    fn switch_camera(&self) -> Result<Device, SwitchError> {
        let mut graph = self.graph.lock();
        let current = graph.video_input.clone().ok_or(SwitchError::NoActiveInput)?;
        let target = current.position.opposite();

        let alternate = self
            .backend
            .devices(DeviceKind::Camera)
            .into_iter()
            .find(|d| d.position == target && d.id != current.id)
            .ok_or(SwitchError::NoAlternateDevice)?;

        self.replace_input(&mut graph, alternate.clone())
            .map_err(|e| SwitchError::InputRejected(e.to_string()))?;
        drop(graph);

        self.notify(|o| o.on_camera_switched(alternate.position));
        Ok(alternate)
    }

    fn change_input(&self, device: Device, kind: DeviceKind) -> Result<(), CaptureError> {
        if device.kind != kind {
            return Err(CaptureError::InputRejected(format!("{} is not a {:?}", device.name, kind)));
        }

        let mut graph = self.graph.lock();
        if !graph.is_configured() {
            return Err(SwitchError::NoActiveInput.into());
        }
        if graph.slot(kind).as_ref().is_some_and(|d| d.id == device.id) {
            return Ok(());
        }

        let position = device.position;
        self.replace_input(&mut graph, device)?;
        drop(graph);

        if kind == DeviceKind::Camera {
            self.notify(|o| o.on_camera_switched(position));
        }
        Ok(())
    }

    /// The graph stays locked from reading the active camera until the
    /// device is unlocked again.
    fn set_torch(&self, mode: TorchMode) -> Result<(), TorchError> {
        let backend = self.backend.as_ref();
        let graph = self.graph.lock();
        let device = graph.video_input.as_ref().ok_or(TorchError::NoActiveInput)?;

        if !device.has_torch || !backend.is_torch_mode_supported(device, mode) {
            return Err(TorchError::Unsupported);
        }

        let _lock = ConfigurationLock::acquire(backend, device).map_err(|e| TorchError::LockFailed(e.to_string()))?;
        if backend.torch_mode(device) == mode {
            return Ok(());
        }
        backend
            .set_torch_mode(device, mode)
            .map_err(|e| TorchError::Rejected(e.to_string()))?;
        log::debug!("Torch set to {:?} on {}", mode, device.name);
        Ok(())
    }

    fn teardown(&self) {
        let mut graph = self.graph.lock();
        self.stop_running();

        if graph.outputs_attached {
            self.backend.remove_output(Track::Video);
            self.backend.remove_output(Track::Audio);
        }
        for device in [graph.video_input.take(), graph.audio_input.take()].into_iter().flatten() {
            self.backend.remove_input(&device);
        }
        *graph = SessionGraph::default();
        log::info!("Capture session torn down");
    }
}

/// Owns the capture graph: one video input, an optional audio input and the
/// two output sinks feeding a single consumer.
///
/// Start, stop and input swaps run on a dedicated session thread; running the
/// hardware up can block, so the caller's thread never does it directly.
/// Configuration itself is synchronous so errors come back to the caller.
///
/// ## Lifecycle
/// ```text
/// new → configure → (running) → switch_camera / set_torch … → teardown
/// ```
pub struct DeviceSession<B: CaptureBackend + 'static> {
    shared: Arc<Shared<B>>,
    consumer: Arc<dyn SampleBufferDelegate>,
    queue: SessionQueue,
}

impl<B: CaptureBackend + 'static> DeviceSession<B> {
    pub fn new(backend: Arc<B>, consumer: Arc<dyn SampleBufferDelegate>) -> Result<Self, CaptureError> {
        Ok(Self {
            shared: Arc::new(Shared {
                backend,
                graph: Mutex::new(SessionGraph::default()),
                observer: RwLock::new(None),
            }),
            consumer,
            queue: SessionQueue::new("capture-session")?,
        })
    }

    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        *self.shared.observer.write() = Some(observer);
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.shared.backend
    }

    pub fn possible_video_inputs(&self) -> Vec<Device> {
        self.shared.backend.devices(DeviceKind::Camera)
    }

    pub fn possible_audio_inputs(&self) -> Vec<Device> {
        self.shared.backend.devices(DeviceKind::Microphone)
    }

    pub fn active_video_device(&self) -> Option<Device> {
        self.shared.graph.lock().video_input.clone()
    }

    pub fn active_audio_device(&self) -> Option<Device> {
        self.shared.graph.lock().audio_input.clone()
    }

    pub fn preset(&self) -> SessionPreset {
        self.shared.graph.lock().preset
    }

    pub fn is_running(&self) -> bool {
        self.shared.backend.is_running()
    }

    /// Build the capture graph and start it on the session thread.
    ///
    /// A missing or rejected microphone is logged and recording proceeds
    /// without sound. Any other failure leaves the graph empty.
    pub fn configure(&self, audio: Option<Device>, video: Device, preset: SessionPreset) -> Result<(), SetupError> {
        let backend = &self.shared.backend;
        let mut graph = self.shared.graph.lock();
        if graph.is_configured() {
            return Err(SetupError::AlreadyConfigured);
        }

        if let Err(e) = backend.set_preset(preset) {
            log::warn!("Preset {:?} rejected, keeping backend default: {}", preset, e);
        }

        backend
            .add_input(&video)
            .map_err(|e| SetupError::DeviceUnavailable(format!("{}: {}", video.name, e)))?;
        log::info!("Video input: {}", video.name);
        graph.video_input = Some(video);

        match audio {
            Some(audio) => match backend.add_input(&audio) {
                Ok(()) => {
                    log::info!("Audio input: {}", audio.name);
                    graph.audio_input = Some(audio);
                }
                Err(e) => log::warn!("Audio input {} unavailable, recording without sound: {}", audio.name, e),
            },
            None => log::warn!("No microphone available, recording without sound"),
        }

        for track in [Track::Video, Track::Audio] {
            if let Err(e) = backend.add_output(track, Arc::clone(&self.consumer)) {
                log::error!("Failed to attach {} output: {}", track.as_str(), e);
                backend.remove_output(Track::Video);
                for device in [graph.video_input.take(), graph.audio_input.take()].into_iter().flatten() {
                    backend.remove_input(&device);
                }
                return Err(SetupError::OutputUnavailable(e.to_string()));
            }
        }
        graph.outputs_attached = true;
        graph.preset = preset;
        drop(graph);

        self.start_running();
        Ok(())
    }

    /// Configure with the default camera and microphone at the high preset.
    pub fn configure_with_defaults(&self) -> Result<(), SetupError> {
        let backend = &self.shared.backend;
        let video = backend
            .default_device(DeviceKind::Camera)
            .ok_or_else(|| SetupError::DeviceUnavailable("no camera found".into()))?;
        let audio = backend.default_device(DeviceKind::Microphone);
        self.configure(audio, video, SessionPreset::High)
    }

    /// Start hardware delivery on the session thread. Fire-and-forget.
    pub fn start_running(&self) {
        let shared = Arc::clone(&self.shared);
        if !self.queue.dispatch(move || shared.start_running()) {
            log::error!("Session queue is shut down; cannot start");
        }
    }

    /// Stop hardware delivery on the session thread. Fire-and-forget.
    pub fn stop_running(&self) {
        let shared = Arc::clone(&self.shared);
        if !self.queue.dispatch(move || shared.stop_running()) {
            log::error!("Session queue is shut down; cannot stop");
        }
    }

    /// Replace the active camera with the one at the opposite position.
    ///
    /// The alternate is looked up before anything is removed, so a missing
    /// camera leaves the current input in place.
    pub fn switch_camera(&self) -> Result<Device, SwitchError> {
        let shared = Arc::clone(&self.shared);
        self.queue.run_sync(move || shared.switch_camera()).unwrap_or_else(|e| {
            log::error!("Camera switch did not run: {}", e);
            Err(SwitchError::SessionUnavailable(e.to_string()))
        })
    }

    pub fn change_video_input(&self, device: Device) -> Result<(), CaptureError> {
        let shared = Arc::clone(&self.shared);
        self.queue
            .run_sync(move || shared.change_input(device, DeviceKind::Camera))?
    }

    pub fn change_audio_input(&self, device: Device) -> Result<(), CaptureError> {
        let shared = Arc::clone(&self.shared);
        self.queue
            .run_sync(move || shared.change_input(device, DeviceKind::Microphone))?
    }

    /// Set the torch of the active camera.
    ///
    /// Runs on the session thread, so an input swap cannot interleave with
    /// the configuration lock.
    pub fn set_torch(&self, mode: TorchMode) -> Result<(), TorchError> {
        let shared = Arc::clone(&self.shared);
        self.queue
            .run_sync(move || shared.set_torch(mode))
            .unwrap_or_else(|e| Err(TorchError::SessionUnavailable(e.to_string())))
    }

    pub fn current_torch_mode(&self) -> TorchMode {
        self.active_video_device()
            .map(|device| self.shared.backend.torch_mode(&device))
            .unwrap_or_default()
    }

    pub fn is_torch_supported(&self) -> bool {
        self.active_video_device()
            .is_some_and(|device| device.has_torch && self.shared.backend.is_torch_mode_supported(&device, TorchMode::On))
    }

    /// Position of the active camera.
    pub fn camera_position(&self) -> Option<DevicePosition> {
        self.active_video_device().map(|d| d.position)
    }

    /// Stop the session and dismantle the graph. Blocks until done.
    pub fn teardown(&self) {
        let shared = Arc::clone(&self.shared);
        if let Err(e) = self.queue.run_sync(move || shared.teardown()) {
            log::error!("Teardown did not run: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{video_buffer, wait_until, MockBackend, RecordingObserver, RecordingSink};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Holds every configuration lock request until released.
    struct GatedBackend {
        inner: MockBackend,
        waiting: AtomicBool,
        released: AtomicBool,
    }

    impl GatedBackend {
        fn new(inner: MockBackend) -> Self {
            Self {
                inner,
                waiting: AtomicBool::new(false),
                released: AtomicBool::new(false),
            }
        }
    }

    impl CaptureBackend for GatedBackend {
        fn devices(&self, kind: DeviceKind) -> Vec<Device> {
            self.inner.devices(kind)
        }

        fn set_preset(&self, preset: SessionPreset) -> Result<(), CaptureError> {
            self.inner.set_preset(preset)
        }

        fn add_input(&self, device: &Device) -> Result<(), CaptureError> {
            self.inner.add_input(device)
        }

        fn remove_input(&self, device: &Device) {
            self.inner.remove_input(device)
        }

        fn add_output(&self, track: Track, delegate: Arc<dyn SampleBufferDelegate>) -> Result<(), CaptureError> {
            self.inner.add_output(track, delegate)
        }

        fn remove_output(&self, track: Track) {
            self.inner.remove_output(track)
        }

        fn start_running(&self) {
            self.inner.start_running()
        }

        fn stop_running(&self) {
            self.inner.stop_running()
        }

        fn is_running(&self) -> bool {
            self.inner.is_running()
        }

        fn lock_for_configuration(&self, device: &Device) -> Result<(), CaptureError> {
            self.waiting.store(true, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            self.inner.lock_for_configuration(device)
        }

        fn unlock_for_configuration(&self, device: &Device) {
            self.inner.unlock_for_configuration(device)
        }

        fn torch_mode(&self, device: &Device) -> TorchMode {
            self.inner.torch_mode(device)
        }

        fn is_torch_mode_supported(&self, device: &Device, mode: TorchMode) -> bool {
            self.inner.is_torch_mode_supported(device, mode)
        }

        fn set_torch_mode(&self, device: &Device, mode: TorchMode) -> Result<(), CaptureError> {
            self.inner.set_torch_mode(device, mode)
        }
    }

    struct Harness {
        session: DeviceSession<MockBackend>,
        backend: Arc<MockBackend>,
        sink: Arc<RecordingSink>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(backend: MockBackend) -> Harness {
        let backend = Arc::new(backend);
        let sink = Arc::new(RecordingSink::default());
        let observer = Arc::new(RecordingObserver::default());
        let session = DeviceSession::new(Arc::clone(&backend), sink.clone()).unwrap();
        session.set_observer(observer.clone());
        Harness {
            session,
            backend,
            sink,
            observer,
        }
    }

    fn configured() -> Harness {
        let h = harness(MockBackend::phone());
        h.session.configure_with_defaults().unwrap();
        assert!(wait_until(|| h.backend.is_running()));
        h
    }

    #[test]
    fn configure_builds_graph_and_starts() {
        let h = configured();

        assert_eq!(h.backend.input_ids(), vec!["back", "mic"]);
        assert!(h.backend.has_output(Track::Video));
        assert!(h.backend.has_output(Track::Audio));
        assert_eq!(h.backend.preset(), Some(SessionPreset::High));
        assert!(wait_until(|| *h.observer.running.lock() == vec![true]));

        h.backend.deliver(video_buffer(7));
        assert_eq!(h.sink.video_times(), vec![7]);
    }

    #[test]
    fn configure_twice_is_rejected() {
        let h = configured();
        let camera = h.backend.device("front");
        assert_eq!(
            h.session.configure(None, camera, SessionPreset::Low),
            Err(SetupError::AlreadyConfigured)
        );
    }

    #[test]
    fn missing_microphone_is_not_an_error() {
        let h = harness(MockBackend::phone());
        let camera = h.backend.device("back");
        h.session.configure(None, camera, SessionPreset::Medium).unwrap();

        assert_eq!(h.session.active_audio_device(), None);
        assert!(h.backend.has_output(Track::Audio));

        let h = harness(MockBackend::phone());
        h.backend.reject_input("mic");
        h.session.configure_with_defaults().unwrap();
        assert_eq!(h.backend.input_ids(), vec!["back"]);
    }

    #[test]
    fn rejected_camera_leaves_session_empty() {
        let h = harness(MockBackend::phone());
        h.backend.reject_input("back");
        let outcome = h.session.configure_with_defaults();

        assert!(matches!(outcome, Err(SetupError::DeviceUnavailable(_))));
        assert!(h.backend.input_ids().is_empty());
        assert!(!h.backend.is_running());
    }

    #[test]
    fn rejected_output_rolls_back_inputs() {
        let h = harness(MockBackend::phone());
        h.backend.reject_outputs();
        let outcome = h.session.configure_with_defaults();

        assert!(matches!(outcome, Err(SetupError::OutputUnavailable(_))));
        assert!(h.backend.input_ids().is_empty());
        assert_eq!(h.session.active_video_device(), None);

        // Graph is empty again, so configure can be retried
        assert!(!matches!(
            h.session.configure_with_defaults(),
            Err(SetupError::AlreadyConfigured)
        ));
    }

    #[test]
    fn switch_camera_round_trip() {
        let h = configured();

        let front = h.session.switch_camera().unwrap();
        assert_eq!(front.position, DevicePosition::Front);
        assert_eq!(h.backend.input_ids(), vec!["mic", "front"]);

        let back = h.session.switch_camera().unwrap();
        assert_eq!(back.position, DevicePosition::Back);
        assert_eq!(h.session.camera_position(), Some(DevicePosition::Back));
        assert_eq!(
            *h.observer.switched.lock(),
            vec![DevicePosition::Front, DevicePosition::Back]
        );

        // Stopped around each change and running afterwards
        let events = h.backend.events();
        let tail: Vec<&str> = events.iter().rev().take(4).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["stop", "remove:front", "add:back", "start"]);
        assert!(h.backend.is_running());
    }

    #[test]
    fn switch_without_alternate_keeps_current_input() {
        let h = harness(MockBackend::new(vec![
            Device::camera("back", "Back Camera", DevicePosition::Back, true),
            Device::microphone("mic", "Built-in Microphone"),
        ]));
        h.session.configure_with_defaults().unwrap();

        assert_eq!(h.session.switch_camera(), Err(SwitchError::NoAlternateDevice));
        assert_eq!(h.backend.input_ids(), vec!["back", "mic"]);
        assert!(h.observer.switched.lock().is_empty());
    }

    #[test]
    fn rejected_switch_restores_previous_camera() {
        let h = configured();
        h.backend.reject_input("front");

        assert!(matches!(h.session.switch_camera(), Err(SwitchError::InputRejected(_))));
        assert_eq!(h.session.camera_position(), Some(DevicePosition::Back));
        assert!(h.backend.input_ids().contains(&"back".to_string()));
        assert!(h.backend.is_running());
    }

    #[test]
    fn switch_before_configure_fails() {
        let h = harness(MockBackend::phone());
        assert_eq!(h.session.switch_camera(), Err(SwitchError::NoActiveInput));
    }

    #[test]
    fn change_inputs_by_device() {
        let h = configured();
        let front = h.backend.device("front");
        h.session.change_video_input(front).unwrap();
        assert_eq!(h.session.camera_position(), Some(DevicePosition::Front));

        let mic = h.backend.device("mic");
        assert!(matches!(
            h.session.change_video_input(mic.clone()),
            Err(CaptureError::InputRejected(_))
        ));
        // Same device again is a no-op
        h.session.change_audio_input(mic).unwrap();
        assert_eq!(h.backend.input_ids(), vec!["mic", "front"]);
    }

    #[test]
    fn torch_toggles_under_configuration_lock() {
        let h = configured();
        assert!(h.session.is_torch_supported());
        assert_eq!(h.session.current_torch_mode(), TorchMode::Off);

        h.session.set_torch(TorchMode::On).unwrap();
        assert_eq!(h.session.current_torch_mode(), TorchMode::On);
        assert_eq!(h.backend.lock_count(), 1);
        assert!(!h.backend.is_locked("back"));

        // Already on: locked and released, mode untouched
        h.session.set_torch(TorchMode::On).unwrap();
        assert_eq!(h.backend.lock_count(), 2);
        assert!(!h.backend.is_locked("back"));
        assert_eq!(h.session.current_torch_mode(), TorchMode::On);
    }

    #[test]
    fn torch_unsupported_on_front_camera() {
        let h = configured();
        h.session.switch_camera().unwrap();

        assert!(!h.session.is_torch_supported());
        assert_eq!(h.session.set_torch(TorchMode::On), Err(TorchError::Unsupported));
        assert_eq!(h.backend.lock_count(), 0);
    }

    #[test]
    fn torch_lock_failure_is_reported() {
        let h = configured();
        h.backend.fail_lock();
        assert!(matches!(
            h.session.set_torch(TorchMode::On),
            Err(TorchError::LockFailed(_))
        ));
        assert_eq!(h.session.current_torch_mode(), TorchMode::Off);
    }

    #[test]
    fn teardown_dismantles_graph() {
        let h = configured();
        h.session.teardown();

        assert!(!h.backend.is_running());
        assert!(h.backend.input_ids().is_empty());
        assert!(!h.backend.has_output(Track::Video));
        assert!(!h.backend.has_output(Track::Audio));
        assert_eq!(h.session.active_video_device(), None);

        h.backend.deliver(video_buffer(1));
        assert!(h.sink.video_times().is_empty());
        assert_eq!(h.observer.running.lock().last(), Some(&false));

        // Can be configured again
        h.session.configure_with_defaults().unwrap();
        assert!(wait_until(|| h.backend.is_running()));
    }

    #[test]
    fn camera_switch_waits_for_torch_change() {
        let backend = Arc::new(GatedBackend::new(MockBackend::phone()));
        let session = DeviceSession::new(Arc::clone(&backend), Arc::new(RecordingSink::default())).unwrap();
        session.configure_with_defaults().unwrap();

        thread::scope(|s| {
            let torch = s.spawn(|| session.set_torch(TorchMode::On));
            assert!(wait_until(|| backend.waiting.load(Ordering::SeqCst)));

            let switch = s.spawn(|| session.switch_camera());
            thread::sleep(Duration::from_millis(50));
            assert_eq!(backend.inner.input_ids(), vec!["back", "mic"]);

            backend.released.store(true, Ordering::SeqCst);
            assert_eq!(torch.join().unwrap(), Ok(()));
            assert_eq!(switch.join().unwrap().unwrap().position, DevicePosition::Front);
        });

        let back = backend.inner.device("back");
        assert_eq!(backend.inner.torch_mode(&back), TorchMode::On);
        assert!(!backend.inner.is_locked("back"));
        assert_eq!(session.camera_position(), Some(DevicePosition::Front));
    }

    #[test]
    fn operations_after_queue_shutdown_report_unavailable_session() {
        let h = configured();
        h.session.queue.shutdown();

        assert!(matches!(h.session.switch_camera(), Err(SwitchError::SessionUnavailable(_))));
        assert!(matches!(
            h.session.set_torch(TorchMode::On),
            Err(TorchError::SessionUnavailable(_))
        ));
        assert_eq!(h.session.camera_position(), Some(DevicePosition::Back));
    }
}
