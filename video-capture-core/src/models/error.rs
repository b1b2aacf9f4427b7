use thiserror::Error;

/// General capture failures: backend, storage and configuration problems.
///
/// Operation-specific errors below convert into this type so callers that do
/// not care about the distinction can use `?` throughout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("input rejected: {0}")]
    InputRejected(String),

    #[error("output rejected: {0}")]
    OutputRejected(String),

    #[error("device configuration locked: {0}")]
    ConfigurationLocked(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Switch(#[from] SwitchError),

    #[error(transparent)]
    Torch(#[from] TorchError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Failure to build the capture graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("video device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("output sink rejected: {0}")]
    OutputUnavailable(String),

    #[error("session already configured")]
    AlreadyConfigured,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwitchError {
    #[error("no camera available at the opposite position")]
    NoAlternateDevice,

    #[error("session has no active video input")]
    NoActiveInput,

    #[error("new input rejected: {0}")]
    InputRejected(String),

    #[error("capture session unavailable: {0}")]
    SessionUnavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TorchError {
    #[error("torch unsupported on the active device")]
    Unsupported,

    #[error("session has no active video input")]
    NoActiveInput,

    #[error("could not lock device for configuration: {0}")]
    LockFailed(String),

    #[error("torch change rejected: {0}")]
    Rejected(String),

    #[error("capture session unavailable: {0}")]
    SessionUnavailable(String),
}

/// Movie writer failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("failed to open movie writer: {0}")]
    OpenFailed(String),

    #[error("failed to finalize movie: {0}")]
    FinalizeFailed(String),

    #[error("recording stopped before any video frame arrived")]
    NoVideoFrames,

    #[error("writer is not accepting samples")]
    NotWriting,

    #[error("{0} track is not ready for more media data")]
    NotReady(&'static str),

    #[error("no {0} track configured")]
    MissingTrack(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("failed to save movie to library: {0}")]
    SaveFailed(String),
}
