use serde::{Deserialize, Serialize};

/// Recorder state machine.
///
/// State transitions:
/// ```text
/// idle → recording ⇄ paused
///           ↓          ↓
///        stopping ← ───┘
///           ↓
///         idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopping,
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Recording or paused: a write session exists and can be stopped.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

/// Lifecycle of one in-progress movie as seen by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteSessionStatus {
    /// Created, waiting for video dimensions before the writer can open.
    NotStarted,
    Writing,
    Finishing,
    Completed,
    Failed,
}

/// Status reported by a movie writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterStatus {
    Unknown,
    Writing,
    Completed,
    Failed,
    Cancelled,
}

impl WriterStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}
