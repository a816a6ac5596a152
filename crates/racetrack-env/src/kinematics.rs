//! Vehicle kinematics
//!
//! A point-mass car: speed changes by a fixed delta, heading turns by a fixed
//! delta, then the car moves `speed` pixels along its new heading. Headings
//! are in degrees, screen coordinates (y grows downward), so 90° points down.

use serde::{Deserialize, Serialize};

/// Default top speed in pixels per tick
pub const DEFAULT_MAX_SPEED: f64 = 5.0;

/// Pose and speed of the car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
    /// Heading in degrees, always in `[0, 360)`
    pub heading: f64,
    /// Signed speed, always in `[-max_speed, max_speed]`
    pub speed: f64,
}

impl VehicleState {
    /// Stationary car facing right
    #[must_use]
    pub fn at_rest(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            heading: 0.0,
            speed: 0.0,
        }
    }
}

/// Per-tick effect of an action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Change in speed
    pub accel_delta: f64,
    /// Change in heading, degrees
    pub turn_delta: f64,
}

impl Control {
    /// Leave speed and heading untouched
    pub const NONE: Self = Self {
        accel_delta: 0.0,
        turn_delta: 0.0,
    };
}

/// Reduce an angle in degrees to `[0, 360)`.
#[must_use]
pub fn wrap_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Advance the car by one tick.
#[must_use]
pub fn advance(state: &VehicleState, control: Control, max_speed: f64) -> VehicleState {
    let speed = (state.speed + control.accel_delta).clamp(-max_speed, max_speed);
    let heading = wrap_heading(state.heading + control.turn_delta);
    let rad = heading.to_radians();

    VehicleState {
        x: state.x + speed * rad.cos(),
        y: state.y + speed * rad.sin(),
        heading,
        speed,
    }
}
