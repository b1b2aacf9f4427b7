//! # video-capture-sim
//!
//! Simulated capture backend for video-capture-kit.
//!
//! Provides:
//! - `SimulatedBackend` — Back and front cameras plus a microphone, with one
//!   delivery thread per track stamping buffers on a shared host clock
//! - `SimulatedFormat` — Frame rate and audio block layout of the simulation
//! - `frames` — Synthetic BGRA gradient frames and 440 Hz sine PCM blocks
//!
//! Useful for running the whole pipeline on machines without camera
//! hardware and for end-to-end tests against real movie files.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use video_capture_core::{CapturePipeline, DirectoryLibrary, MovieFileStorage, RecorderConfiguration};
//! use video_capture_sim::SimulatedBackend;
//!
//! let backend = Arc::new(SimulatedBackend::phone());
//! let library = Arc::new(DirectoryLibrary::new("/tmp/library"));
//! let pipeline = CapturePipeline::new(backend, MovieFileStorage::default(), library, RecorderConfiguration::default())?;
//! pipeline.session().configure_with_defaults()?;
//! pipeline.recorder().start();
//! ```

pub mod backend;
pub mod frames;

pub use backend::{preset_dimensions, SimConnection, SimulatedBackend, SimulatedFormat};
