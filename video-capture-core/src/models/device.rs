use serde::{Deserialize, Serialize};

/// Kind of capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Camera,
    Microphone,
}

/// Physical mounting of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePosition {
    Unspecified,
    Back,
    Front,
}

impl DevicePosition {
    /// Position a camera switch moves to. Unspecified counts as back.
    pub fn opposite(&self) -> DevicePosition {
        match self {
            Self::Back | Self::Unspecified => Self::Front,
            Self::Front => Self::Back,
        }
    }
}

/// A capture device discovered from the backend.
///
/// The backend owns the hardware; a session only holds on to the active one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub position: DevicePosition,
    pub has_torch: bool,
}

impl Device {
    pub fn camera(id: impl Into<String>, name: impl Into<String>, position: DevicePosition, has_torch: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: DeviceKind::Camera,
            position,
            has_torch,
        }
    }

    pub fn microphone(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: DeviceKind::Microphone,
            position: DevicePosition::Unspecified,
            has_torch: false,
        }
    }

    pub fn is_camera(&self) -> bool {
        self.kind == DeviceKind::Camera
    }
}

/// Torch (continuous flash) state of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorchMode {
    #[default]
    Off,
    On,
    Auto,
}

/// Capture quality preset applied to the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPreset {
    Low,
    Medium,
    #[default]
    High,
    Photo,
    Hd1280x720,
    Hd1920x1080,
    Hd3840x2160,
}
