//! Environment wrappers

use racetrack_core::{ActionSpace, Environment, Episode, ObservationSpace, Step};

/// Default cap on steps per episode
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// Time limit wrapper
///
/// Marks the step that reaches `max_steps` as truncated and done, so no
/// episode runs forever.
pub struct TimeLimit<E> {
    /// Inner environment
    pub env: E,
    /// Maximum steps
    pub max_steps: usize,
    /// Current step count
    pub steps: usize,
}

impl<E> TimeLimit<E> {
    /// Create a new time limit wrapper
    pub fn new(env: E, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            steps: 0,
        }
    }

    /// Borrow the wrapped environment
    pub fn inner(&self) -> &E {
        &self.env
    }

    /// Mutably borrow the wrapped environment
    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }
}

impl<E> Environment for TimeLimit<E>
where
    E: Environment,
{
    type Observation = E::Observation;
    type Action = E::Action;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        self.env.observation_space()
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        self.env.action_space()
    }

    fn reset(&mut self) -> racetrack_core::Result<Self::Observation> {
        self.steps = 0;
        self.env.reset()
    }

    fn step(&mut self, action: Self::Action) -> racetrack_core::Result<Step<Self::Observation>> {
        self.steps += 1;
        let mut step = self.env.step(action)?;

        if self.steps >= self.max_steps && !step.done {
            step.truncated = true;
            step.done = true;
        }

        Ok(step)
    }

    fn episode_info(&self) -> Option<Episode> {
        self.env.episode_info()
    }
}
