use crate::algorithm::a_star_search;
use crate::common::{Agent, Conflict, ConflictType, Constraints, JointPlan, Path, State};
use crate::error::{Endpoint, InstanceError};
use crate::map::Map;
use crate::stat::Stats;

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// A problem instance: the grid and the agents routed on it.
///
/// Constraints are not part of the environment. Every query that depends on
/// them takes the constraint set of the agent concerned as an argument.
#[derive(Debug, Clone)]
pub struct Environment {
    pub map: Map,
    pub agents: Vec<Agent>,
    // Agents whose goal is connected to their start on the static grid.
    reachable: HashSet<String>,
}

impl Environment {
    /// Rejects instances with endpoints outside the grid or on obstacles,
    /// repeated names, or two agents sharing a start or a goal.
    pub fn new(map: Map, agents: Vec<Agent>) -> Result<Self, InstanceError> {
        Self::validate(&map, &agents)?;

        let reachable = agents
            .iter()
            .filter(|agent| map.distance_map(agent.goal).contains_key(&agent.start))
            .map(|agent| agent.name.clone())
            .collect();

        Ok(Environment {
            map,
            agents,
            reachable,
        })
    }

    fn validate(map: &Map, agents: &[Agent]) -> Result<(), InstanceError> {
        let mut names = HashSet::new();
        let mut starts: HashMap<_, &str> = HashMap::new();
        let mut goals: HashMap<_, &str> = HashMap::new();

        for agent in agents {
            if !names.insert(agent.name.as_str()) {
                return Err(InstanceError::DuplicateName(agent.name.clone()));
            }

            for (endpoint, location, seen) in [
                (Endpoint::Start, agent.start, &mut starts),
                (Endpoint::Goal, agent.goal, &mut goals),
            ] {
                if !map.in_bounds(location) {
                    return Err(InstanceError::OutOfBounds {
                        agent: agent.name.clone(),
                        endpoint,
                        location,
                    });
                }
                if map.is_obstacle(location) {
                    return Err(InstanceError::OnObstacle {
                        agent: agent.name.clone(),
                        endpoint,
                        location,
                    });
                }
                if let Some(other) = seen.insert(location, agent.name.as_str()) {
                    return Err(InstanceError::SharedEndpoint {
                        agent_1: other.to_string(),
                        agent_2: agent.name.clone(),
                        endpoint,
                        location,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    pub fn is_reachable(&self, agent: &Agent) -> bool {
        self.reachable.contains(&agent.name)
    }

    /// State of a path at `time`; a finished path holds its last location.
    pub fn get_state(path: &Path, time: usize) -> Option<State> {
        path.get(time)
            .or_else(|| path.last())
            .map(|state| State::new(time, state.location))
    }

    pub fn state_valid(&self, state: &State, constraints: &Constraints) -> bool {
        self.map.is_passable(state.location)
            && !constraints.is_vertex_forbidden(state.time, state.location)
    }

    pub fn transition_valid(&self, from: &State, to: &State, constraints: &Constraints) -> bool {
        !constraints.is_edge_forbidden(from.time, from.location, to.location)
    }

    pub fn admissible_heuristic(&self, state: &State, agent: &Agent) -> usize {
        state.location.manhattan_distance(&agent.goal)
    }

    pub fn is_at_goal(&self, state: &State, agent: &Agent) -> bool {
        state.location == agent.goal
    }

    /// Valid successors of `state`: waiting in place plus the four moves.
    pub fn get_neighbors(&self, state: &State, constraints: &Constraints) -> Vec<State> {
        let mut neighbors = Vec::with_capacity(5);

        let wait = State::new(state.time + 1, state.location);
        if self.state_valid(&wait, constraints) {
            neighbors.push(wait);
        }

        for location in self.map.get_neighbors(state.location) {
            let next = State::new(state.time + 1, location);
            if self.state_valid(&next, constraints)
                && self.transition_valid(state, &next, constraints)
            {
                neighbors.push(next);
            }
        }

        neighbors
    }

    /// Plans every agent on its own under its constraints. Agents missing
    /// from `constraints` are unconstrained. Fails as a whole as soon as one
    /// agent cannot reach its goal.
    pub fn compute_path(
        &self,
        constraints: &BTreeMap<String, Constraints>,
        stats: &mut Stats,
    ) -> Option<JointPlan> {
        let unconstrained = Constraints::default();
        let mut paths = JointPlan::new();

        for agent in &self.agents {
            let agent_constraints = constraints.get(&agent.name).unwrap_or(&unconstrained);
            let path = a_star_search(self, agent, agent_constraints, stats)?;
            paths.insert(agent.name.clone(), path);
        }

        Some(paths)
    }

    pub fn compute_path_cost(&self, paths: &JointPlan) -> usize {
        paths.values().map(Vec::len).sum()
    }

    /// Earliest conflict in the joint plan. At each time step every pair is
    /// checked for a vertex conflict before any pair is checked for an edge
    /// conflict; pairs follow the agents' order.
    pub fn get_first_conflict(&self, paths: &JointPlan) -> Option<Conflict> {
        let planned: Vec<(&str, &Path)> = self
            .agents
            .iter()
            .filter_map(|agent| {
                paths
                    .get(&agent.name)
                    .map(|path| (agent.name.as_str(), path))
            })
            .collect();
        let max_t = planned.iter().map(|(_, path)| path.len()).max().unwrap_or(0);

        let pairs: Vec<_> = planned
            .iter()
            .enumerate()
            .flat_map(|(i, first)| planned[i + 1..].iter().map(move |second| (*first, *second)))
            .collect();

        for t in 0..max_t {
            for &((agent_1, path_1), (agent_2, path_2)) in &pairs {
                let (Some(state_1), Some(state_2)) =
                    (Self::get_state(path_1, t), Self::get_state(path_2, t))
                else {
                    continue;
                };

                if state_1.is_equal_except_time(&state_2) {
                    let conflict = Conflict {
                        time: t,
                        agent_1: agent_1.to_string(),
                        agent_2: agent_2.to_string(),
                        conflict_type: ConflictType::Vertex {
                            location: state_1.location,
                        },
                    };
                    debug!("first conflict: {conflict:?}");
                    return Some(conflict);
                }
            }

            for &((agent_1, path_1), (agent_2, path_2)) in &pairs {
                let (Some(state_1a), Some(state_1b), Some(state_2a), Some(state_2b)) = (
                    Self::get_state(path_1, t),
                    Self::get_state(path_1, t + 1),
                    Self::get_state(path_2, t),
                    Self::get_state(path_2, t + 1),
                ) else {
                    continue;
                };

                if state_1a.is_equal_except_time(&state_2b)
                    && state_1b.is_equal_except_time(&state_2a)
                {
                    let conflict = Conflict {
                        time: t,
                        agent_1: agent_1.to_string(),
                        agent_2: agent_2.to_string(),
                        conflict_type: ConflictType::Edge {
                            location_1: state_1a.location,
                            location_2: state_1b.location,
                        },
                    };
                    debug!("first conflict: {conflict:?}");
                    return Some(conflict);
                }
            }
        }

        None
    }

    /// One constraint addition per agent of the conflict, `agent_1` first.
    pub fn create_constraints_from_conflict(&self, conflict: &Conflict) -> Vec<(String, Constraints)> {
        match conflict.conflict_type {
            ConflictType::Vertex { location } => {
                let constraint = Constraints::from_vertex(conflict.time, location);
                vec![
                    (conflict.agent_1.clone(), constraint.clone()),
                    (conflict.agent_2.clone(), constraint),
                ]
            }
            ConflictType::Edge {
                location_1,
                location_2,
            } => vec![
                (
                    conflict.agent_1.clone(),
                    Constraints::from_edge(conflict.time, location_1, location_2),
                ),
                (
                    conflict.agent_2.clone(),
                    Constraints::from_edge(conflict.time, location_2, location_1),
                ),
            ],
        }
    }
}
