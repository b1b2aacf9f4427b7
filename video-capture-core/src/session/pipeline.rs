use std::sync::Arc;

use crate::models::config::RecorderConfiguration;
use crate::models::error::CaptureError;
use crate::session::device_session::DeviceSession;
use crate::session::dispatcher::SampleDispatcher;
use crate::session::gallery::GalleryPreview;
use crate::session::recorder::Recorder;
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::movie_storage::MovieStorage;
use crate::traits::photo_library::PhotoLibrary;

/// The full capture pipeline, wired:
///
/// ```text
/// [CaptureBackend] → DeviceSession ─(outputs)→ SampleDispatcher → Recorder → [MovieStorage]
///                                                                      └─ stop → [PhotoLibrary]
/// [PhotoLibrary] → GalleryPreview
/// ```
pub struct CapturePipeline<B, S, L>
where
    B: CaptureBackend + 'static,
    S: MovieStorage + 'static,
    L: PhotoLibrary + 'static,
{
    session: DeviceSession<B>,
    dispatcher: Arc<SampleDispatcher>,
    recorder: Arc<Recorder<S, L>>,
    gallery: GalleryPreview<L>,
}

impl<B, S, L> CapturePipeline<B, S, L>
where
    B: CaptureBackend + 'static,
    S: MovieStorage + 'static,
    L: PhotoLibrary + 'static,
{
    pub fn new(backend: Arc<B>, storage: S, library: Arc<L>, config: RecorderConfiguration) -> Result<Self, CaptureError> {
        let thumbnail_size = config.thumbnail_size;
        let recorder = Arc::new(Recorder::new(config, storage, Arc::clone(&library))?);
        let dispatcher = Arc::new(SampleDispatcher::new(recorder.clone()));
        let session = DeviceSession::new(backend, dispatcher.clone())?;
        let gallery = GalleryPreview::new(library, thumbnail_size);

        Ok(Self {
            session,
            dispatcher,
            recorder,
            gallery,
        })
    }

    pub fn session(&self) -> &DeviceSession<B> {
        &self.session
    }

    pub fn dispatcher(&self) -> &Arc<SampleDispatcher> {
        &self.dispatcher
    }

    pub fn recorder(&self) -> &Arc<Recorder<S, L>> {
        &self.recorder
    }

    pub fn gallery(&self) -> &GalleryPreview<L> {
        &self.gallery
    }
}
