//! Player state codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric state code reported by the wrapped player.
///
/// The codes belong to the player, not to this crate. The constants below are
/// the well-known values; any other code is carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerState(i32);

impl PlayerState {
    pub const UNSTARTED: Self = Self(-1);
    pub const ENDED: Self = Self(0);
    pub const PLAYING: Self = Self(1);
    pub const PAUSED: Self = Self(2);
    pub const BUFFERING: Self = Self(3);
    pub const CUED: Self = Self(5);

    /// Wrap a raw state code.
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// The raw state code.
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Human-readable label for logs. Unknown codes map to `"unknown"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::UNSTARTED => "unstarted",
            Self::ENDED => "ended",
            Self::PLAYING => "playing",
            Self::PAUSED => "paused",
            Self::BUFFERING => "buffering",
            Self::CUED => "cued",
            _ => "unknown",
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::UNSTARTED
    }
}

impl From<i32> for PlayerState {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<PlayerState> for i32 {
    fn from(state: PlayerState) -> i32 {
        state.0
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.0)
    }
}
