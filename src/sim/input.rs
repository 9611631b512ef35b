//! Abstract driver input
//!
//! The front end maps physical keys to an [`Action`] for a player slot. Slot 0
//! is the first human player, slot 1 the second in split screen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Accelerate,
    Brake,
    TurnLeft,
    TurnRight,
    Reverse,
    /// Use the oldest weapon held
    Fire,
}

/// A key going down or up for one player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub slot: usize,
    pub action: Action,
    pub pressed: bool,
}

impl InputEvent {
    pub fn press(slot: usize, action: Action) -> Self {
        Self {
            slot,
            action,
            pressed: true,
        }
    }

    pub fn release(slot: usize, action: Action) -> Self {
        Self {
            slot,
            action,
            pressed: false,
        }
    }
}
