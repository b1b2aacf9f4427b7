use serde::{Deserialize, Serialize};

/// Physical orientation of the handset as reported by its motion sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl DeviceOrientation {
    pub(crate) fn to_raw(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Portrait => 1,
            Self::PortraitUpsideDown => 2,
            Self::LandscapeLeft => 3,
            Self::LandscapeRight => 4,
            Self::FaceUp => 5,
            Self::FaceDown => 6,
        }
    }

    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Portrait,
            2 => Self::PortraitUpsideDown,
            3 => Self::LandscapeLeft,
            4 => Self::LandscapeRight,
            5 => Self::FaceUp,
            6 => Self::FaceDown,
            _ => Self::Unknown,
        }
    }
}

/// Orientation applied to a video delivery connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeRight,
    LandscapeLeft,
}

impl From<DeviceOrientation> for CaptureOrientation {
    /// Landscape left/right are swapped: the sensor is mounted rotated
    /// relative to the screen. Flat and unknown orientations fall back to
    /// portrait.
    fn from(orientation: DeviceOrientation) -> Self {
        match orientation {
            DeviceOrientation::LandscapeRight => CaptureOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeLeft => CaptureOrientation::LandscapeRight,
            DeviceOrientation::Portrait => CaptureOrientation::Portrait,
            DeviceOrientation::PortraitUpsideDown => CaptureOrientation::PortraitUpsideDown,
            DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => {
                CaptureOrientation::Portrait
            }
        }
    }
}
