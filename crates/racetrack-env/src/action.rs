//! The fixed catalog of driving actions

use racetrack_core::{DiscreteAction, RLError};
use serde::{Deserialize, Serialize};

use crate::kinematics::Control;

/// Speed change per accelerate/brake tick
pub const ACCEL_STEP: f64 = 0.2;
/// Heading change per turn tick, degrees
pub const TURN_STEP: f64 = 3.0;

/// Discrete driving action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveAction {
    /// Speed up
    Accelerate,
    /// Slow down, eventually reversing
    Brake,
    /// Rotate counter-clockwise on screen
    TurnLeft,
    /// Rotate clockwise on screen
    TurnRight,
    /// Do nothing
    Coast,
}

impl DriveAction {
    /// Every action, in index order
    pub const ALL: [DriveAction; 5] = [
        DriveAction::Accelerate,
        DriveAction::Brake,
        DriveAction::TurnLeft,
        DriveAction::TurnRight,
        DriveAction::Coast,
    ];

    /// Number of actions in the catalog
    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`DriveAction::ALL`]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up an action by index
    pub fn from_index(index: usize) -> racetrack_core::Result<Self> {
        Self::ALL.get(index).copied().ok_or_else(|| {
            RLError::InvalidAction(format!(
                "action index {index} outside catalog of {}",
                Self::COUNT
            ))
        })
    }

    /// Speed and heading deltas this action applies
    #[must_use]
    pub fn control(self) -> Control {
        match self {
            DriveAction::Accelerate => Control {
                accel_delta: ACCEL_STEP,
                turn_delta: 0.0,
            },
            DriveAction::Brake => Control {
                accel_delta: -ACCEL_STEP,
                turn_delta: 0.0,
            },
            DriveAction::TurnLeft => Control {
                accel_delta: 0.0,
                turn_delta: -TURN_STEP,
            },
            DriveAction::TurnRight => Control {
                accel_delta: 0.0,
                turn_delta: TURN_STEP,
            },
            DriveAction::Coast => Control::NONE,
        }
    }
}

impl From<DriveAction> for DiscreteAction {
    fn from(action: DriveAction) -> Self {
        DiscreteAction(action.index())
    }
}

impl TryFrom<DiscreteAction> for DriveAction {
    type Error = RLError;

    fn try_from(action: DiscreteAction) -> Result<Self, Self::Error> {
        Self::from_index(action.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_round_trip_through_catalog() {
        for (i, action) in DriveAction::ALL.iter().enumerate() {
            assert_eq!(action.index(), i);
            assert_eq!(DriveAction::from_index(i).unwrap(), *action);
        }
        assert!(DriveAction::from_index(DriveAction::COUNT).is_err());
    }
}
