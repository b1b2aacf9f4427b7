pub mod library;
pub mod metadata;
pub mod movie_format;
pub mod movie_reader;
pub mod movie_writer;
