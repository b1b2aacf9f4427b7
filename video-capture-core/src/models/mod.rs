pub mod config;
pub mod device;
pub mod error;
pub mod gallery;
pub mod media;
pub mod orientation;
pub mod recording_result;
pub mod state;
