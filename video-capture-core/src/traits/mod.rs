pub mod capture_backend;
pub mod movie_storage;
pub mod observers;
pub mod photo_library;
pub mod sample_delegate;
