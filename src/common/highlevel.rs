use super::{JointPlan, Location};
use crate::env::Environment;
use crate::stat::Stats;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Forbids standing on `location` at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexConstraint {
    pub time: usize,
    pub location: Location,
}

/// Forbids moving from `from` at `time` to `to` at `time + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeConstraint {
    pub time: usize,
    pub from: Location,
    pub to: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    pub vertex_constraints: HashSet<VertexConstraint>,
    pub edge_constraints: HashSet<EdgeConstraint>,
}

impl Constraints {
    pub fn from_vertex(time: usize, location: Location) -> Self {
        let mut constraints = Constraints::default();
        constraints
            .vertex_constraints
            .insert(VertexConstraint { time, location });
        constraints
    }

    pub fn from_edge(time: usize, from: Location, to: Location) -> Self {
        let mut constraints = Constraints::default();
        constraints
            .edge_constraints
            .insert(EdgeConstraint { time, from, to });
        constraints
    }

    pub fn add_constraint(&mut self, other: &Constraints) {
        self.vertex_constraints
            .extend(other.vertex_constraints.iter().copied());
        self.edge_constraints
            .extend(other.edge_constraints.iter().copied());
    }

    pub fn is_vertex_forbidden(&self, time: usize, location: Location) -> bool {
        self.vertex_constraints
            .contains(&VertexConstraint { time, location })
    }

    pub fn is_edge_forbidden(&self, time: usize, from: Location, to: Location) -> bool {
        self.edge_constraints
            .contains(&EdgeConstraint { time, from, to })
    }

    /// Latest time step at which any constraint still has an effect.
    pub fn latest_time_step(&self) -> Option<usize> {
        let vertex = self.vertex_constraints.iter().map(|c| c.time);
        // An edge constraint at `time` restricts the arrival at `time + 1`.
        let edge = self.edge_constraints.iter().map(|c| c.time + 1);
        vertex.chain(edge).max()
    }

    pub fn is_superset(&self, other: &Constraints) -> bool {
        self.vertex_constraints.is_superset(&other.vertex_constraints)
            && self.edge_constraints.is_superset(&other.edge_constraints)
    }

    pub fn len(&self) -> usize {
        self.vertex_constraints.len() + self.edge_constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConflictType {
    Vertex {
        location: Location,
    },
    /// `agent_1` moves `location_1 -> location_2` while `agent_2` moves back.
    Edge {
        location_1: Location,
        location_2: Location,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conflict {
    pub time: usize,
    pub agent_1: String,
    pub agent_2: String,
    pub conflict_type: ConflictType,
}

#[derive(Clone, Debug)]
pub(crate) struct HighLevelOpenNode {
    pub(crate) constraints: BTreeMap<String, Constraints>,
    pub(crate) paths: JointPlan,
    pub(crate) cost: usize, // Sum of path lengths under current constraints
}

// Two nodes are the same once they hold the same plan at the same cost,
// whatever constraints produced them.
impl PartialEq for HighLevelOpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.paths == other.paths
    }
}

impl Eq for HighLevelOpenNode {}

impl Ord for HighLevelOpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            // Fixed tie-break so that repeated runs pick the same node.
            .then_with(|| self.paths.cmp(&other.paths))
    }
}

impl PartialOrd for HighLevelOpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl HighLevelOpenNode {
    pub(crate) fn new(env: &Environment, stats: &mut Stats) -> Option<Self> {
        let constraints: BTreeMap<String, Constraints> = env
            .agents
            .iter()
            .map(|agent| (agent.name.clone(), Constraints::default()))
            .collect();

        let paths = env.compute_path(&constraints, stats)?;
        let start = HighLevelOpenNode {
            cost: env.compute_path_cost(&paths),
            constraints,
            paths,
        };

        debug!("High level start node {start:?}");
        Some(start)
    }

    /// Branches a child that owns a private copy of every agent's
    /// constraints, with `addition` merged into `agent`'s set. Returns `None`
    /// when some agent can no longer reach its goal.
    pub(crate) fn update_constraint(
        &self,
        agent: &str,
        addition: &Constraints,
        env: &Environment,
        stats: &mut Stats,
    ) -> Option<HighLevelOpenNode> {
        let mut new_constraints = self.constraints.clone();
        new_constraints
            .entry(agent.to_string())
            .or_default()
            .add_constraint(addition);

        let Some(new_paths) = env.compute_path(&new_constraints, stats) else {
            debug!("agent {agent} is unreachable under {addition:?}");
            return None;
        };

        let new_node = HighLevelOpenNode {
            cost: env.compute_path_cost(&new_paths),
            constraints: new_constraints,
            paths: new_paths,
        };
        debug!(
            "Update agent {agent} for {addition:?}, cost {} -> {}",
            self.cost, new_node.cost
        );
        Some(new_node)
    }

    pub(crate) fn key(&self) -> (usize, JointPlan) {
        (self.cost, self.paths.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Agent, State};
    use crate::map::Map;
    use std::collections::BTreeSet;

    fn crossing_env() -> Environment {
        let map = Map::new(3, 3, Vec::new()).unwrap();
        let agents = vec![
            Agent::new("agent0", Location::new(0, 1), Location::new(2, 1)),
            Agent::new("agent1", Location::new(1, 0), Location::new(1, 2)),
        ];
        Environment::new(map, agents).unwrap()
    }

    #[test]
    fn test_constraints_collapse_duplicates() {
        let mut constraints = Constraints::from_vertex(2, Location::new(1, 1));
        constraints.add_constraint(&Constraints::from_vertex(2, Location::new(1, 1)));
        constraints.add_constraint(&Constraints::from_edge(
            1,
            Location::new(0, 0),
            Location::new(0, 1),
        ));
        constraints.add_constraint(&Constraints::from_edge(
            1,
            Location::new(0, 0),
            Location::new(0, 1),
        ));
        assert_eq!(constraints.len(), 2);
        assert!(constraints.is_vertex_forbidden(2, Location::new(1, 1)));
        assert!(!constraints.is_vertex_forbidden(3, Location::new(1, 1)));
        assert!(constraints.is_edge_forbidden(1, Location::new(0, 0), Location::new(0, 1)));
        assert!(!constraints.is_edge_forbidden(1, Location::new(0, 1), Location::new(0, 0)));
    }

    #[test]
    fn test_latest_time_step() {
        let mut constraints = Constraints::default();
        assert_eq!(constraints.latest_time_step(), None);
        constraints.add_constraint(&Constraints::from_vertex(3, Location::new(1, 1)));
        assert_eq!(constraints.latest_time_step(), Some(3));
        constraints.add_constraint(&Constraints::from_edge(
            4,
            Location::new(0, 0),
            Location::new(0, 1),
        ));
        assert_eq!(constraints.latest_time_step(), Some(5));
    }

    #[test]
    fn test_open_nodes_order_by_cost() {
        let cheap = HighLevelOpenNode {
            constraints: BTreeMap::new(),
            paths: JointPlan::new(),
            cost: 3,
        };
        let expensive = HighLevelOpenNode {
            constraints: BTreeMap::new(),
            paths: JointPlan::new(),
            cost: 5,
        };
        let mut open = BTreeSet::new();
        open.insert(expensive);
        open.insert(cheap);
        assert_eq!(open.pop_first().unwrap().cost, 3);
    }

    #[test]
    fn test_nodes_equal_by_plan_and_cost() {
        let mut constrained = BTreeMap::new();
        constrained.insert(
            "agent0".to_string(),
            Constraints::from_vertex(1, Location::new(0, 0)),
        );
        let paths = JointPlan::from([(
            "agent0".to_string(),
            vec![State::new(0, Location::new(0, 0))],
        )]);
        let a = HighLevelOpenNode {
            constraints: BTreeMap::new(),
            paths: paths.clone(),
            cost: 1,
        };
        let b = HighLevelOpenNode {
            constraints: constrained,
            paths,
            cost: 1,
        };
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_update_constraint_is_monotone() {
        let env = crossing_env();
        let stats = &mut Stats::default();
        let root = HighLevelOpenNode::new(&env, stats).unwrap();
        assert_eq!(root.cost, 6);

        let conflict = env.get_first_conflict(&root.paths).unwrap();
        for (agent, addition) in env.create_constraints_from_conflict(&conflict) {
            let child = root.update_constraint(&agent, &addition, &env, stats).unwrap();
            assert!(child.constraints[&agent].is_superset(&root.constraints[&agent]));
            assert!(child.constraints[&agent].len() > root.constraints[&agent].len());
            assert!(child.cost >= root.cost);
        }
    }

    #[test]
    fn test_update_constraint_leaves_parent_and_siblings_untouched() {
        let env = crossing_env();
        let stats = &mut Stats::default();
        let root = HighLevelOpenNode::new(&env, stats).unwrap();
        let conflict = env.get_first_conflict(&root.paths).unwrap();
        let additions = env.create_constraints_from_conflict(&conflict);

        let children: Vec<_> = additions
            .iter()
            .map(|(agent, addition)| {
                root.update_constraint(agent, addition, &env, stats)
                    .unwrap()
            })
            .collect();

        assert!(root.constraints.values().all(Constraints::is_empty));
        let (first_agent, _) = &additions[0];
        let (second_agent, _) = &additions[1];
        assert!(!children[0].constraints[first_agent].is_empty());
        assert!(children[0].constraints[second_agent].is_empty());
        assert!(children[1].constraints[first_agent].is_empty());
        assert!(!children[1].constraints[second_agent].is_empty());
    }
}
