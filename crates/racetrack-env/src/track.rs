//! Track geometry and point classification
//!
//! A track is a drivable ring (outer boundary minus an inner hole), one
//! hazard patch and a finish gate, all inside a rectangular window. The
//! geometry is immutable once built; share it with `Arc` between the
//! environment and whatever draws it.

use racetrack_core::RLError;
use serde::{Deserialize, Serialize};

/// A point in window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Closed polygon given by its vertices in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Vertices; the last connects back to the first
    pub vertices: Vec<Point>,
}

impl Polygon {
    /// Build a polygon from `(x, y)` pairs
    #[must_use]
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            vertices: pairs.iter().copied().map(Point::from).collect(),
        }
    }

    /// Even-odd ray casting test.
    ///
    /// Interior points are inside, exterior points are not; points exactly
    /// on an edge may fall either way.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (pi, pj) = (self.vertices[i], self.vertices[j]);
            if (pi.y > y) != (pj.y > y) {
                let x_cross = (pj.x - pi.x) * (y - pi.y) / (pj.y - pi.y) + pi.x;
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Finish gate: a band of half-width `thickness` around `x`, limited to
/// `y_min..=y_max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinishGate {
    /// Gate line x-coordinate
    pub x: f64,
    /// Accepted distance from the gate line
    pub thickness: f64,
    /// Top of the gate
    pub y_min: f64,
    /// Bottom of the gate
    pub y_max: f64,
    /// Sanctioned heading window, degrees, exclusive on both ends
    pub heading_window: (f64, f64),
}

impl FinishGate {
    /// Whether a position lies on the gate
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (x - self.x).abs() <= self.thickness && y >= self.y_min && y <= self.y_max
    }

    /// Whether a heading crosses the gate in the sanctioned direction
    #[must_use]
    pub fn accepts_heading(&self, heading: f64) -> bool {
        let (low, high) = self.heading_window;
        heading > low && heading < high
    }
}

impl Default for FinishGate {
    fn default() -> Self {
        Self {
            x: 675.0,
            thickness: 75.0,
            y_min: 290.0,
            y_max: 310.0,
            heading_window: (60.0, 120.0),
        }
    }
}

/// Rectangular window the car lives in, `[0, width] x [0, height]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Window width
    pub width: f64,
    /// Window height
    pub height: f64,
}

impl WindowBounds {
    /// Clamp a position into the window
    #[must_use]
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }

    /// Whether a position can be classified at all
    #[must_use]
    pub fn addresses(&self, x: f64, y: f64) -> bool {
        x.is_finite()
            && y.is_finite()
            && (0.0..=self.width).contains(&x)
            && (0.0..=self.height).contains(&y)
    }
}

impl Default for WindowBounds {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Surface under a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Surface {
    /// Inside the ring and clear of the hazard
    OnRoad,
    /// Outside the ring or inside the hole
    OffRoad,
    /// Inside the hazard patch
    Hazard,
}

/// Immutable description of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackGeometry {
    /// Window the track is drawn in
    pub window: WindowBounds,
    /// Outer road boundary
    pub outer: Polygon,
    /// Hole in the middle of the ring
    pub inner: Polygon,
    /// Penalty patch that ends the episode
    pub hazard: Polygon,
    /// Finish gate
    pub finish: FinishGate,
    /// Where the car spawns on reset
    pub spawn: Point,
}

impl Default for TrackGeometry {
    fn default() -> Self {
        Self {
            window: WindowBounds::default(),
            outer: Polygon::from_pairs(&[(50.0, 50.0), (750.0, 50.0), (750.0, 550.0), (50.0, 550.0)]),
            inner: Polygon::from_pairs(&[
                (200.0, 200.0),
                (600.0, 200.0),
                (600.0, 400.0),
                (200.0, 400.0),
            ]),
            hazard: Polygon::from_pairs(&[
                (350.0, 450.0),
                (450.0, 450.0),
                (450.0, 500.0),
                (350.0, 500.0),
            ]),
            finish: FinishGate::default(),
            spawn: Point::new(425.0, 150.0),
        }
    }
}

impl TrackGeometry {
    /// Check the geometry once before a run
    pub fn validate(&self) -> racetrack_core::Result<()> {
        let WindowBounds { width, height } = self.window;
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(RLError::InvalidConfig(format!(
                "window must have positive finite extents, got {width}x{height}"
            )));
        }
        for (name, polygon) in [("outer", &self.outer), ("inner", &self.inner), ("hazard", &self.hazard)] {
            if polygon.vertices.len() < 3 {
                return Err(RLError::InvalidConfig(format!(
                    "{name} polygon needs at least 3 vertices"
                )));
            }
        }
        if self.finish.y_min > self.finish.y_max || self.finish.thickness < 0.0 {
            return Err(RLError::InvalidConfig("finish gate bounds are inverted".into()));
        }
        if !self.window.addresses(self.spawn.x, self.spawn.y) {
            return Err(RLError::InvalidConfig(format!(
                "spawn ({}, {}) lies outside the window",
                self.spawn.x, self.spawn.y
            )));
        }
        Ok(())
    }

    /// Whether a point is inside the hazard patch
    #[must_use]
    pub fn in_hazard(&self, x: f64, y: f64) -> bool {
        self.hazard.contains(x, y)
    }

    /// Whether a point is on drivable road
    #[must_use]
    pub fn is_on_road(&self, x: f64, y: f64) -> bool {
        self.outer.contains(x, y) && !self.inner.contains(x, y) && !self.in_hazard(x, y)
    }

    /// Whether a point lies on the finish gate
    #[must_use]
    pub fn in_finish_gate(&self, x: f64, y: f64) -> bool {
        self.finish.contains(x, y)
    }

    /// Classify a point; the hazard wins over everything else
    #[must_use]
    pub fn classify(&self, x: f64, y: f64) -> Surface {
        if self.in_hazard(x, y) {
            Surface::Hazard
        } else if self.is_on_road(x, y) {
            Surface::OnRoad
        } else {
            Surface::OffRoad
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_track_classifies_landmarks() {
        let track = TrackGeometry::default();
        track.validate().unwrap();

        assert_eq!(track.classify(425.0, 150.0), Surface::OnRoad);
        assert_eq!(track.classify(400.0, 300.0), Surface::OffRoad); // hole
        assert_eq!(track.classify(20.0, 20.0), Surface::OffRoad); // outside
        assert_eq!(track.classify(400.0, 475.0), Surface::Hazard);
        assert!(track.in_finish_gate(675.0, 300.0));
        assert!(!track.in_finish_gate(675.0, 320.0));
    }

    #[test]
    fn hazard_cancels_on_road() {
        let track = TrackGeometry::default();
        assert!(track.outer.contains(400.0, 475.0));
        assert!(!track.is_on_road(400.0, 475.0));
    }

    #[test]
    fn gate_heading_window_is_open() {
        let gate = FinishGate::default();
        assert!(gate.accepts_heading(90.0));
        assert!(!gate.accepts_heading(60.0));
        assert!(!gate.accepts_heading(120.0));
        assert!(!gate.accepts_heading(270.0));
    }

    #[test]
    fn degenerate_polygons_contain_nothing() {
        let line = Polygon::from_pairs(&[(0.0, 0.0), (10.0, 10.0)]);
        assert!(!line.contains(5.0, 5.0));
    }

    #[test]
    fn geometry_round_trips_through_json() {
        let track = TrackGeometry::default();
        let json = serde_json::to_string(&track).unwrap();
        let parsed: TrackGeometry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, track);
    }

    #[test]
    fn validation_rejects_spawn_outside_window() {
        let track = TrackGeometry {
            spawn: Point::new(900.0, 10.0),
            ..TrackGeometry::default()
        };
        assert!(track.validate().is_err());
    }
}
