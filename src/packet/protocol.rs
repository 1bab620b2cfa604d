//! # Packet Types
//!
//! Command state and the timestamped envelope sent to the receiver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Command value for full deflection in either direction (per-mille)
pub const COMMAND_MAX: i32 = 1000;

/// Command value for centered / neutral
pub const COMMAND_CENTER: i32 = 0;

/// Gear value for reverse
pub const GEAR_REVERSE: i8 = -1;

/// Gear value for neutral
pub const GEAR_NEUTRAL: i8 = 0;

/// Discriminator telling the receiver which [`CommandState`] shape follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateType {
    Ground,
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateType::Ground => f.write_str("ground"),
        }
    }
}

/// Control intent for a wheeled vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroundState {
    /// Steering, -1000 (full left) to 1000 (full right)
    pub steer: i32,
    /// Throttle/brake, -1000 (full reverse/brake) to 1000 (full forward)
    pub esc: i32,
    /// Selected gear, -1 = reverse, 0 = neutral
    pub gear: i8,
}

/// Normalized control intent produced by a controller
///
/// Immutable once produced; a fresh value is read on every sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandState {
    Ground(GroundState),
}

impl CommandState {
    /// Discriminator for this state's concrete shape
    #[must_use]
    pub fn state_type(&self) -> StateType {
        match self {
            CommandState::Ground(_) => StateType::Ground,
        }
    }
}

/// Outbound envelope: one per sampling tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub state_type: StateType,
    pub state: CommandState,
    pub sent_at: DateTime<Utc>,
}

impl Packet {
    /// Wraps a state with its discriminator and the current wall-clock time
    #[must_use]
    pub fn new(state: CommandState) -> Self {
        Self::at(state, Utc::now())
    }

    /// Wraps a state with an explicit capture timestamp
    #[must_use]
    pub fn at(state: CommandState, sent_at: DateTime<Utc>) -> Self {
        Self {
            state_type: state.state_type(),
            state,
            sent_at,
        }
    }
}
