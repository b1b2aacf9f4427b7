use std::path::{Path, PathBuf};

use crate::models::error::{CaptureError, ExportError};
use crate::models::gallery::Thumbnail;
use crate::models::media::Dimensions;

/// Invoked once with the library location of the saved movie.
pub type ExportCallback = Box<dyn FnOnce(Result<PathBuf, ExportError>) + Send + 'static>;

/// The device photo library.
pub trait PhotoLibrary: Send + Sync {
    /// Import a finished movie. Completes asynchronously.
    fn save_video(&self, path: &Path, completion: ExportCallback);

    /// Thumbnail of the most recent image or video asset, aspect-filled to
    /// `size`. `Ok(None)` when the library is empty.
    ///
    /// May block on disk; callers run it off the UI thread.
    fn latest_thumbnail(&self, size: Dimensions) -> Result<Option<Thumbnail>, CaptureError>;
}
