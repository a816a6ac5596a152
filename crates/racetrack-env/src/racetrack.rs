//! Closed-track driving environment

use std::sync::Arc;

use racetrack_core::{
    ActionSpace, BoxObservationSpace, DiscreteAction, DiscreteSpace, Environment,
    ObservationSpace, RLError, Result, Reward, Step, StepInfo, VectorObservation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::DriveAction;
use crate::kinematics::{advance, wrap_heading, Control, VehicleState, DEFAULT_MAX_SPEED};
use crate::render::FrameSink;
use crate::track::TrackGeometry;

/// Reward schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Driving into the hazard patch
    pub hazard: f64,
    /// Each tick spent off the road
    pub off_road: f64,
    /// Crossing the gate in the sanctioned direction
    pub finish: f64,
    /// Crossing the gate the wrong way
    pub wrong_way: f64,
    /// Each ordinary tick on the road
    pub step: f64,
    /// Position that cannot be classified
    pub out_of_bounds: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            hazard: -10.0,
            off_road: -1.0,
            finish: 10.0,
            wrong_way: -5.0,
            step: -0.01,
            out_of_bounds: -100.0,
        }
    }
}

/// Environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceTrackConfig {
    /// Top speed in pixels per tick
    pub max_speed: f64,
    /// Divisor applied to speed in the observation
    pub speed_scale: f64,
    /// Reward schedule
    pub rewards: RewardConfig,
}

impl Default for RaceTrackConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            speed_scale: DEFAULT_MAX_SPEED,
            rewards: RewardConfig::default(),
        }
    }
}

impl RaceTrackConfig {
    /// Reject non-positive scales
    pub fn validate(&self) -> Result<()> {
        if !(self.max_speed > 0.0 && self.max_speed.is_finite()) {
            return Err(RLError::InvalidConfig(format!(
                "max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        if !(self.speed_scale > 0.0 && self.speed_scale.is_finite()) {
            return Err(RLError::InvalidConfig(format!(
                "speed_scale must be positive, got {}",
                self.speed_scale
            )));
        }
        Ok(())
    }
}

/// What happened on a step, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Position could not be classified; fail-safe termination
    OutOfBounds,
    /// Inside the hazard patch
    Hazard,
    /// Off the road; the episode goes on
    OffRoad,
    /// Crossed the gate heading the right way
    Finished,
    /// Crossed the gate heading the wrong way
    WrongWay,
    /// Nothing notable
    Driving,
}

impl StepOutcome {
    /// Classify a (clamped) vehicle pose against the track
    #[must_use]
    pub fn evaluate(track: &TrackGeometry, vehicle: &VehicleState) -> Self {
        let (x, y) = (vehicle.x, vehicle.y);
        if !track.window.addresses(x, y) {
            StepOutcome::OutOfBounds
        } else if track.in_hazard(x, y) {
            StepOutcome::Hazard
        } else if !track.is_on_road(x, y) {
            StepOutcome::OffRoad
        } else if track.in_finish_gate(x, y) {
            if track.finish.accepts_heading(vehicle.heading) {
                StepOutcome::Finished
            } else {
                StepOutcome::WrongWay
            }
        } else {
            StepOutcome::Driving
        }
    }

    /// Reward paid for this outcome
    #[must_use]
    pub fn reward(self, rewards: &RewardConfig) -> f64 {
        match self {
            StepOutcome::OutOfBounds => rewards.out_of_bounds,
            StepOutcome::Hazard => rewards.hazard,
            StepOutcome::OffRoad => rewards.off_road,
            StepOutcome::Finished => rewards.finish,
            StepOutcome::WrongWay => rewards.wrong_way,
            StepOutcome::Driving => rewards.step,
        }
    }

    /// Whether the outcome ends the episode
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, StepOutcome::OffRoad | StepOutcome::Driving)
    }

    /// Stable name used in step info and traces
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StepOutcome::OutOfBounds => "out_of_bounds",
            StepOutcome::Hazard => "hazard",
            StepOutcome::OffRoad => "off_road",
            StepOutcome::Finished => "finished",
            StepOutcome::WrongWay => "wrong_way",
            StepOutcome::Driving => "driving",
        }
    }
}

/// Apply one control to a vehicle: kinematics, window clamp, classification.
#[must_use]
pub fn transition(
    track: &TrackGeometry,
    config: &RaceTrackConfig,
    vehicle: &VehicleState,
    control: Control,
) -> (VehicleState, StepOutcome) {
    let mut next = advance(vehicle, control, config.max_speed);
    let (x, y) = track.window.clamp(next.x, next.y);
    next.x = x;
    next.y = y;
    let outcome = StepOutcome::evaluate(track, &next);
    (next, outcome)
}

/// Scale a vehicle pose into the observation vector
/// `[x / width, y / height, heading / 360, speed / speed_scale]`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn normalize(track: &TrackGeometry, config: &RaceTrackConfig, vehicle: &VehicleState) -> VectorObservation {
    VectorObservation::new(vec![
        (vehicle.x / track.window.width) as f32,
        (vehicle.y / track.window.height) as f32,
        (vehicle.heading / 360.0) as f32,
        (vehicle.speed / config.speed_scale) as f32,
    ])
}

/// Size of the observation vector
pub const OBSERVATION_DIM: usize = 4;

/// The racetrack environment
pub struct RaceTrackEnv {
    track: Arc<TrackGeometry>,
    config: RaceTrackConfig,
    vehicle: VehicleState,
    frame_sink: Option<Box<dyn FrameSink>>,
}

impl RaceTrackEnv {
    /// Create an environment over a shared track
    pub fn new(track: Arc<TrackGeometry>, config: RaceTrackConfig) -> Result<Self> {
        track.validate()?;
        config.validate()?;
        let vehicle = VehicleState::at_rest(track.spawn.x, track.spawn.y);
        Ok(Self {
            track,
            config,
            vehicle,
            frame_sink: None,
        })
    }

    /// Forward every frame to a renderer or recorder
    #[must_use]
    pub fn with_frame_sink(mut self, sink: impl FrameSink + 'static) -> Self {
        self.frame_sink = Some(Box::new(sink));
        self
    }

    /// The shared track
    #[must_use]
    pub fn track(&self) -> &Arc<TrackGeometry> {
        &self.track
    }

    /// Environment configuration
    #[must_use]
    pub fn config(&self) -> &RaceTrackConfig {
        &self.config
    }

    /// Current car pose
    #[must_use]
    pub fn vehicle(&self) -> &VehicleState {
        &self.vehicle
    }

    /// Overwrite the car pose, e.g. to start a scenario mid-track
    pub fn place(&mut self, vehicle: VehicleState) -> VectorObservation {
        self.vehicle = vehicle;
        self.observe()
    }

    /// Normalized observation of the current pose
    #[must_use]
    pub fn observe(&self) -> VectorObservation {
        normalize(&self.track, &self.config, &self.vehicle)
    }

    /// Respawn at rest at an explicit position
    pub fn reset_at(&mut self, x: f64, y: f64) -> Result<VectorObservation> {
        let vehicle = VehicleState::at_rest(x, y);
        self.emit_frame(&vehicle)?;
        self.vehicle = vehicle;
        Ok(self.observe())
    }

    /// Step with a catalog action
    pub fn drive(&mut self, action: DriveAction) -> Result<Step<VectorObservation>> {
        let mut step = self.apply(action.control())?;
        step.info = step.info.with("action", action.index());
        Ok(step)
    }

    /// Step with an arbitrary control, e.g. accelerating and turning on the
    /// same tick. The pose only changes once the frame sink has accepted it.
    pub fn apply(&mut self, control: Control) -> Result<Step<VectorObservation>> {
        let (mut next, outcome) = transition(&self.track, &self.config, &self.vehicle, control);

        match outcome {
            StepOutcome::OutOfBounds => {
                warn!(
                    x = next.x,
                    y = next.y,
                    "vehicle left the classifiable region; terminating episode"
                );
                next = self.recover_pose(next);
            }
            o if o.is_terminal() => debug!(outcome = o.as_str(), x = next.x, y = next.y, "episode terminated"),
            _ => {}
        }

        self.emit_frame(&next)?;
        self.vehicle = next;

        Ok(Step {
            observation: self.observe(),
            reward: Reward(outcome.reward(&self.config.rewards)),
            done: outcome.is_terminal(),
            truncated: false,
            info: StepInfo::default().with("outcome", outcome.as_str()),
        })
    }

    /// Replace unusable pose fields with the last good value, or the spawn
    /// at rest when there is none, so observations stay finite.
    fn recover_pose(&self, pose: VehicleState) -> VehicleState {
        let spawn = VehicleState::at_rest(self.track.spawn.x, self.track.spawn.y);
        let pick = |value: f64, previous: f64, fallback: f64| {
            if value.is_finite() {
                value
            } else if previous.is_finite() {
                previous
            } else {
                fallback
            }
        };
        let (x, y) = self.track.window.clamp(
            pick(pose.x, self.vehicle.x, spawn.x),
            pick(pose.y, self.vehicle.y, spawn.y),
        );
        VehicleState {
            x,
            y,
            heading: wrap_heading(pick(pose.heading, self.vehicle.heading, spawn.heading)),
            speed: pick(pose.speed, self.vehicle.speed, spawn.speed).clamp(-self.config.max_speed, self.config.max_speed),
        }
    }

    fn emit_frame(&mut self, vehicle: &VehicleState) -> Result<()> {
        if let Some(sink) = self.frame_sink.as_mut() {
            sink.on_frame(&self.track, vehicle)?;
        }
        Ok(())
    }
}

impl Environment for RaceTrackEnv {
    type Observation = VectorObservation;
    type Action = DiscreteAction;

    #[allow(clippy::cast_possible_truncation)]
    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        let speed = (self.config.max_speed / self.config.speed_scale) as f32;
        Box::new(BoxObservationSpace {
            low: vec![0.0, 0.0, 0.0, -speed],
            high: vec![1.0, 1.0, 1.0, speed],
        })
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        Box::new(DiscreteSpace::new(DriveAction::COUNT))
    }

    fn reset(&mut self) -> Result<Self::Observation> {
        let spawn = self.track.spawn;
        self.reset_at(spawn.x, spawn.y)
    }

    fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>> {
        self.drive(DriveAction::try_from(action)?)
    }
}
