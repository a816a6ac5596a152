//! Hand-off point for anything that draws the simulation

use std::sync::{Arc, Mutex};

use racetrack_core::RLError;

use crate::kinematics::VehicleState;
use crate::track::TrackGeometry;

/// Receives the track and the car pose after every reset and step.
///
/// Nothing the sink does feeds back into the simulation.
pub trait FrameSink: Send {
    /// Called once per frame
    fn on_frame(&mut self, track: &TrackGeometry, vehicle: &VehicleState) -> racetrack_core::Result<()>;
}

/// Sink that keeps every pose in memory; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct PoseRecorder {
    poses: Arc<Mutex<Vec<VehicleState>>>,
}

impl PoseRecorder {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded poses, oldest first
    pub fn poses(&self) -> racetrack_core::Result<Vec<VehicleState>> {
        self.poses
            .lock()
            .map(|poses| poses.clone())
            .map_err(|_| RLError::FrameSink("pose log poisoned".into()))
    }
}

impl FrameSink for PoseRecorder {
    fn on_frame(&mut self, _track: &TrackGeometry, vehicle: &VehicleState) -> racetrack_core::Result<()> {
        self.poses
            .lock()
            .map_err(|_| RLError::FrameSink("pose log poisoned".into()))?
            .push(*vehicle);
        Ok(())
    }
}
