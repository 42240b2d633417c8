mod highlevel;
mod lowlevel;

pub use highlevel::{Conflict, ConflictType, Constraints, EdgeConstraint, VertexConstraint};
pub(crate) use highlevel::HighLevelOpenNode;
pub(crate) use lowlevel::LowLevelOpenNode;

use crate::env::Environment;

use std::collections::BTreeMap;
use std::fmt;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub fn new(x: i32, y: i32) -> Self {
        Location { x, y }
    }

    pub fn manhattan_distance(&self, other: &Location) -> usize {
        self.x.abs_diff(other.x) as usize + self.y.abs_diff(other.y) as usize
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An agent standing on `location` at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State {
    pub time: usize,
    pub location: Location,
}

impl State {
    pub fn new(time: usize, location: Location) -> Self {
        State { time, location }
    }

    pub fn is_equal_except_time(&self, other: &State) -> bool {
        self.location == other.location
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub name: String,
    pub start: Location,
    pub goal: Location,
}

impl Agent {
    pub fn new(name: impl Into<String>, start: Location, goal: Location) -> Self {
        Agent {
            name: name.into(),
            start,
            goal,
        }
    }

    pub fn start_state(&self) -> State {
        State::new(0, self.start)
    }
}

pub type Path = Vec<State>;

/// Agent name to its path. Paths may differ in length; a finished agent is
/// considered to stay on its last location.
pub type JointPlan = BTreeMap<String, Path>;

#[derive(Debug, Clone)]
pub struct Solution {
    pub paths: JointPlan,
    pub cost: usize,
}

impl Solution {
    /// Checks every path against the grid and its agent, and the joint plan
    /// against collisions.
    pub fn verify(&self, env: &Environment) -> bool {
        if self.paths.len() != env.agents.len() {
            error!(
                "solution has {} paths for {} agents",
                self.paths.len(),
                env.agents.len()
            );
            return false;
        }

        for agent in &env.agents {
            let Some(path) = self.paths.get(&agent.name) else {
                error!("agent {} has no path", agent.name);
                return false;
            };

            if path.first() != Some(&agent.start_state()) {
                error!("agent {} does not start at {}", agent.name, agent.start);
                return false;
            }
            if path.last().map(|state| state.location) != Some(agent.goal) {
                error!("agent {} does not end at {}", agent.name, agent.goal);
                return false;
            }
            if let Some(state) = path.iter().find(|state| !env.map.is_passable(state.location)) {
                error!("agent {} visits blocked cell {}", agent.name, state.location);
                return false;
            }
            for step in path.windows(2) {
                if step[1].time != step[0].time + 1
                    || step[0].location.manhattan_distance(&step[1].location) > 1
                {
                    error!(
                        "agent {} jumps from {:?} to {:?}",
                        agent.name, step[0], step[1]
                    );
                    return false;
                }
            }
        }

        if let Some(conflict) = env.get_first_conflict(&self.paths) {
            error!("solution still has conflict {conflict:?}");
            return false;
        }

        self.cost == env.compute_path_cost(&self.paths)
    }
}
