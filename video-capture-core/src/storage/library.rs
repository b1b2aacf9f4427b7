use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use parking_lot::Mutex;

use crate::models::error::{CaptureError, ExportError};
use crate::models::gallery::{AssetKind, Thumbnail};
use crate::models::media::{Dimensions, PixelFormat, Track};
use crate::storage::metadata::{metadata_path, read_metadata, write_metadata};
use crate::storage::movie_reader::MovieFile;
use crate::traits::movie_storage::TrackSettings;
use crate::traits::photo_library::{ExportCallback, PhotoLibrary};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
const VIDEO_EXTENSIONS: &[&str] = &["mov", "movie"];

/// Photo library backed by a plain directory.
///
/// Saved movies are moved into the directory under a timestamped name,
/// together with their metadata sidecar when one exists.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Move a finished movie into the library. Blocking.
    pub fn import_video(&self, source: &Path) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| ExportError::SaveFailed(format!("failed to create library directory: {}", e)))?;

        let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("mov");
        let file_name = format!(
            "VID_{}_{}.{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"),
            &uuid::Uuid::new_v4().simple().to_string()[..8],
            extension
        );
        let destination = self.root.join(file_name);

        move_file(source, &destination)
            .map_err(|e| ExportError::SaveFailed(format!("failed to import {}: {}", source.display(), e)))?;

        let sidecar = metadata_path(source);
        if sidecar.exists() {
            if let Err(e) = import_sidecar(source, &destination) {
                log::warn!("Failed to import metadata sidecar {}: {}", sidecar.display(), e);
            }
        }

        Ok(destination)
    }

    /// Most recently modified image or video in the library.
    pub fn latest_asset(&self) -> Result<Option<(PathBuf, AssetKind)>, CaptureError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CaptureError::StorageError(format!("failed to list library: {}", e))),
        };

        let mut latest: Option<(SystemTime, PathBuf, AssetKind)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(kind) = asset_kind(&path) else {
                continue;
            };
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            let newer = match &latest {
                Some((best, best_path, _)) => (modified, &path) > (*best, best_path),
                None => true,
            };
            if newer {
                latest = Some((modified, path, kind));
            }
        }

        Ok(latest.map(|(_, path, kind)| (path, kind)))
    }
}

impl PhotoLibrary for DirectoryLibrary {
    fn save_video(&self, path: &Path, completion: ExportCallback) {
        let builder = thread::Builder::new().name("library-export".into());
        spawn_export(builder, self.clone(), path.to_path_buf(), completion);
    }

    fn latest_thumbnail(&self, size: Dimensions) -> Result<Option<Thumbnail>, CaptureError> {
        let Some((path, kind)) = self.latest_asset()? else {
            return Ok(None);
        };

        let image = match kind {
            AssetKind::Image => image::open(&path)
                .map_err(|e| CaptureError::StorageError(format!("failed to decode {}: {}", path.display(), e)))?,
            AssetKind::Video => match first_video_frame(&path)? {
                Some(frame) => DynamicImage::ImageRgba8(frame),
                None => {
                    log::debug!("Latest movie has no video frames: {}", path.display());
                    return Ok(None);
                }
            },
        };

        Ok(Some(Thumbnail {
            source: path,
            kind,
            image: image.resize_to_fill(size.width, size.height, FilterType::Triangle).to_rgba8(),
        }))
    }
}

/// Import on a background thread. The completion fires exactly once, also
/// when the thread cannot be started.
fn spawn_export(builder: thread::Builder, library: DirectoryLibrary, source: PathBuf, completion: ExportCallback) {
    let slot = Arc::new(Mutex::new(Some(completion)));
    let pending = Arc::clone(&slot);

    let spawned = builder.spawn(move || {
        let outcome = library.import_video(&source);
        match &outcome {
            Ok(destination) => log::info!("Saved movie to library: {}", destination.display()),
            Err(e) => log::error!("{}", e),
        }
        if let Some(completion) = pending.lock().take() {
            completion(outcome);
        }
    });

    if let Err(e) = spawned {
        log::error!("Failed to spawn library export thread: {}", e);
        if let Some(completion) = slot.lock().take() {
            completion(Err(ExportError::SaveFailed(format!("failed to spawn export thread: {}", e))));
        }
    }
}

fn asset_kind(path: &Path) -> Option<AssetKind> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(AssetKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Some(AssetKind::Video)
    } else {
        None
    }
}

/// Decode the first video sample of a movie into RGBA.
fn first_video_frame(path: &Path) -> Result<Option<RgbaImage>, CaptureError> {
    let movie = MovieFile::open(path)?;
    let Some(TrackSettings::Video {
        dimensions,
        pixel_format,
        ..
    }) = movie.track(Track::Video).copied()
    else {
        return Ok(None);
    };
    let Some(sample) = movie.first_sample(Track::Video)? else {
        return Ok(None);
    };

    let rgba = match pixel_format {
        PixelFormat::Bgra32 => bgra_to_rgba(&sample.data, dimensions),
    };
    Ok(RgbaImage::from_raw(dimensions.width, dimensions.height, rgba))
}

fn bgra_to_rgba(data: &[u8], dimensions: Dimensions) -> Vec<u8> {
    let expected = dimensions.width as usize * dimensions.height as usize * 4;
    data.chunks_exact(4)
        .take(expected / 4)
        .flat_map(|px| [px[2], px[1], px[0], px[3]])
        .collect()
}

/// Re-point the sidecar at the imported movie and move it alongside.
fn import_sidecar(source: &Path, destination: &Path) -> Result<(), CaptureError> {
    let mut metadata = read_metadata(source)?;
    metadata.file_path = destination.to_string_lossy().into_owned();
    write_metadata(&metadata, destination)?;
    fs::remove_file(metadata_path(source))
        .map_err(|e| CaptureError::StorageError(format!("failed to remove old sidecar: {}", e)))
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems.
    fs::copy(from, to)?;
    fs::remove_file(from)
}
