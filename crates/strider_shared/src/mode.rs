//! Movement mode identifiers.

use serde::{Deserialize, Serialize};

/// Identifies a movement mode.
///
/// The discriminant is part of the replay byte format.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModeId {
    /// Grounded movement along a walkable floor.
    #[default]
    Walking = 0,
    /// Airborne movement under gravity.
    Falling = 1,
    /// Running along a wall.
    WallRunning = 2,
}

impl ModeId {
    /// Every mode, in discriminant order.
    pub const ALL: [Self; 3] = [Self::Walking, Self::Falling, Self::WallRunning];

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Walking => "Walking",
            Self::Falling => "Falling",
            Self::WallRunning => "WallRunning",
        }
    }

    /// Raw discriminant.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a discriminant.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Walking),
            1 => Some(Self::Falling),
            2 => Some(Self::WallRunning),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
