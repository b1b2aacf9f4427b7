use std::path::PathBuf;

use image::RgbaImage;

/// Kind of asset found in the photo library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Video,
}

/// Preview of the most recent library asset.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub source: PathBuf,
    pub kind: AssetKind,
    pub image: RgbaImage,
}

impl Thumbnail {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
