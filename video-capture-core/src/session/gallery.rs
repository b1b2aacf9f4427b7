use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;

use crate::models::error::CaptureError;
use crate::models::media::Dimensions;
use crate::traits::observers::GalleryObserver;
use crate::traits::photo_library::PhotoLibrary;

/// Fetches the newest library asset as a thumbnail for the gallery button.
pub struct GalleryPreview<L: PhotoLibrary + 'static> {
    library: Arc<L>,
    thumbnail_size: Dimensions,
    observer: Arc<RwLock<Option<Arc<dyn GalleryObserver>>>>,
}

impl<L: PhotoLibrary + 'static> GalleryPreview<L> {
    pub fn new(library: Arc<L>, thumbnail_size: Dimensions) -> Self {
        Self {
            library,
            thumbnail_size,
            observer: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn GalleryObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn thumbnail_size(&self) -> Dimensions {
        self.thumbnail_size
    }

    /// One-shot background fetch. The observer hears nothing when the
    /// library is empty or the fetch fails.
    pub fn fetch_last_image(&self) -> Result<JoinHandle<()>, CaptureError> {
        let library = Arc::clone(&self.library);
        let observer = Arc::clone(&self.observer);
        let size = self.thumbnail_size;

        thread::Builder::new()
            .name("gallery-fetch".into())
            .spawn(move || match library.latest_thumbnail(size) {
                Ok(Some(thumbnail)) => {
                    log::debug!("Last gallery asset: {}", thumbnail.source.display());
                    if let Some(observer) = observer.read().as_ref() {
                        observer.on_last_gallery_image(&thumbnail);
                    }
                }
                Ok(None) => log::debug!("Library is empty"),
                Err(e) => log::warn!("Failed to fetch last gallery image: {}", e),
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn gallery thread: {}", e)))
    }
}
