pub mod device_session;
pub mod dispatcher;
pub mod gallery;
pub mod pipeline;
pub mod recorder;
pub mod session_queue;
