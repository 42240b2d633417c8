use super::Solver;
use crate::common::{HighLevelOpenNode, JointPlan, Solution};
use crate::config::Config;
use crate::env::Environment;
use crate::stat::Stats;

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct CBS {
    env: Environment,
    stats: Stats,
}

impl CBS {
    pub fn new(env: &Environment) -> Self {
        CBS {
            env: env.clone(),
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

impl Solver for CBS {
    /// Best-first search over the constraint tree. The first conflict-free
    /// node popped is returned; `None` means the root plan is infeasible,
    /// the tree ran out of nodes, or the expansion cap was hit.
    fn solve(&mut self, config: &Config) -> Option<Solution> {
        let total_solve_start_time = Instant::now();
        let mut open = BTreeSet::new();
        let mut closed: HashSet<(usize, JointPlan)> = HashSet::new();

        let Some(root) = HighLevelOpenNode::new(&self.env, &mut self.stats) else {
            info!("some agent cannot reach its goal even without constraints");
            return None;
        };
        open.insert(root);

        while let Some(current_node) = open.pop_first() {
            if config
                .max_high_level_expansions
                .is_some_and(|cap| self.stats.high_level_expand_nodes >= cap)
            {
                warn!(
                    "stop after {} high level expansions, {} nodes still open",
                    self.stats.high_level_expand_nodes,
                    open.len() + 1
                );
                return None;
            }
            self.stats.high_level_expand_nodes += 1;
            closed.insert(current_node.key());

            let Some(conflict) = self.env.get_first_conflict(&current_node.paths) else {
                // No conflicts, return solution.
                let total_solve_time = total_solve_start_time.elapsed();
                self.stats.time_ms = total_solve_time.as_micros() as usize;
                self.stats.costs = current_node.cost;

                self.stats.print();
                return Some(Solution {
                    paths: current_node.paths,
                    cost: current_node.cost,
                });
            };
            debug!("conflict: {conflict:?}");

            for (agent, addition) in self.env.create_constraints_from_conflict(&conflict) {
                let Some(child) =
                    current_node.update_constraint(&agent, &addition, &self.env, &mut self.stats)
                else {
                    continue;
                };

                if !closed.contains(&child.key()) {
                    open.insert(child);
                }
            }
        }

        info!(
            "open list exhausted after {} high level expansions",
            self.stats.high_level_expand_nodes
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Agent, Location, State};
    use crate::map::Map;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use tracing_subscriber;

    // Helper function to setup tracing
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();
    }

    fn capped_config(cap: usize) -> Config {
        Config {
            max_high_level_expansions: Some(cap),
            ..Config::default()
        }
    }

    fn agent(name: &str, start: (i32, i32), goal: (i32, i32)) -> Agent {
        Agent::new(
            name,
            Location::new(start.0, start.1),
            Location::new(goal.0, goal.1),
        )
    }

    #[test]
    fn test_cbs_diagonal_crossing() {
        init_tracing();
        let map = Map::new(4, 4, Vec::new()).unwrap();
        let agents = vec![
            agent("agent1", (0, 0), (3, 3)),
            agent("agent2", (3, 0), (0, 3)),
        ];
        let env = Environment::new(map, agents).unwrap();

        let mut solver = CBS::new(&env);
        let solution = solver.solve(&capped_config(10_000)).unwrap();
        assert!(solution.verify(&env));
        assert!(solution.paths.values().all(|path| path.len() >= 7));
        assert!(solution.cost >= 14);
    }

    #[test]
    fn test_cbs_one_agent_waits() {
        init_tracing();
        let map = Map::new(3, 3, Vec::new()).unwrap();
        let agents = vec![
            agent("agent1", (0, 1), (2, 1)),
            agent("agent2", (1, 0), (1, 2)),
        ];
        let env = Environment::new(map, agents).unwrap();

        let mut solver = CBS::new(&env);
        let solution = solver.solve(&Config::default()).unwrap();
        assert!(solution.verify(&env));
        assert_eq!(solution.cost, 7);
        let mut lengths: Vec<_> = solution.paths.values().map(Vec::len).collect();
        lengths.sort();
        assert_eq!(lengths, vec![3, 4]);
        assert!(solver.stats().high_level_expand_nodes >= 2);
    }

    #[test]
    fn test_cbs_corridor_with_pocket() {
        init_tracing();
        // .#
        // ..
        // .#
        let obstacles = vec![Location::new(1, 0), Location::new(1, 2)];
        let map = Map::new(2, 3, obstacles).unwrap();
        let agents = vec![
            agent("agent1", (0, 0), (0, 2)),
            agent("agent2", (0, 2), (0, 0)),
        ];
        let env = Environment::new(map, agents).unwrap();

        let mut solver = CBS::new(&env);
        let solution = solver.solve(&capped_config(10_000)).unwrap();
        assert!(solution.verify(&env));
        assert!(solution.cost >= 9);
        assert!(solution
            .paths
            .values()
            .any(|path| path.iter().any(|state| state.location == Location::new(1, 1))));
    }

    #[test]
    fn test_cbs_head_on_corridor_hits_cap() {
        init_tracing();
        let map = Map::new(1, 3, Vec::new()).unwrap();
        let agents = vec![
            agent("agent1", (0, 0), (0, 2)),
            agent("agent2", (0, 2), (0, 0)),
        ];
        let env = Environment::new(map, agents).unwrap();

        let mut solver = CBS::new(&env);
        assert!(solver.solve(&capped_config(200)).is_none());
        assert!(solver.stats().high_level_expand_nodes <= 200);
    }

    #[test]
    fn test_cbs_enclosed_goal() {
        init_tracing();
        let obstacles = vec![
            Location::new(2, 1),
            Location::new(1, 2),
            Location::new(3, 2),
            Location::new(2, 3),
        ];
        let map = Map::new(5, 5, obstacles).unwrap();
        let agents = vec![
            agent("agent1", (0, 0), (4, 4)),
            agent("agent2", (4, 0), (2, 2)),
        ];
        let env = Environment::new(map, agents).unwrap();

        let mut solver = CBS::new(&env);
        assert!(solver.solve(&Config::default()).is_none());
        assert_eq!(solver.stats().high_level_expand_nodes, 0);
    }

    #[test]
    fn test_cbs_start_is_goal() {
        init_tracing();
        let map = Map::new(3, 3, Vec::new()).unwrap();
        let env = Environment::new(map, vec![agent("agent1", (1, 1), (1, 1))]).unwrap();

        let mut solver = CBS::new(&env);
        let solution = solver.solve(&Config::default()).unwrap();
        assert_eq!(solution.cost, 1);
        assert_eq!(
            solution.paths["agent1"],
            vec![State::new(0, Location::new(1, 1))]
        );
        assert_eq!(solver.stats().low_level_expand_nodes, 1);
    }

    #[test]
    fn test_cbs_is_repeatable() {
        init_tracing();
        let map = Map::new(4, 4, vec![Location::new(1, 1), Location::new(2, 2)]).unwrap();
        let agents = vec![
            agent("agent1", (0, 0), (3, 3)),
            agent("agent2", (3, 0), (0, 3)),
            agent("agent3", (0, 3), (3, 0)),
        ];
        let env = Environment::new(map, agents).unwrap();
        let config = capped_config(10_000);

        let first = CBS::new(&env).solve(&config).unwrap();
        let second = CBS::new(&env).solve(&config).unwrap();
        assert!(first.verify(&env));
        assert_eq!(first.paths, second.paths);
        assert_eq!(first.cost, second.cost);
    }

    #[test]
    fn test_cbs_random_instances() {
        init_tracing();
        let mut rng = StdRng::seed_from_u64(0);
        let mut solved = 0;

        for _ in 0..20 {
            let mut cells: Vec<Location> = (0..6)
                .flat_map(|x| (0..6).map(move |y| Location::new(x, y)))
                .collect();
            cells.shuffle(&mut rng);
            let obstacles = cells.split_off(cells.len() - 5);
            let agents: Vec<Agent> = (0..3)
                .map(|i| Agent::new(format!("agent{i}"), cells[2 * i], cells[2 * i + 1]))
                .collect();
            let env = Environment::new(Map::new(6, 6, obstacles).unwrap(), agents).unwrap();

            if let Some(solution) = CBS::new(&env).solve(&capped_config(200)) {
                solved += 1;
                assert!(solution.verify(&env));
                assert!(env.get_first_conflict(&solution.paths).is_none());
                for agent in &env.agents {
                    let path = &solution.paths[&agent.name];
                    assert!(path.len() > agent.start.manhattan_distance(&agent.goal));
                }
            }
        }

        assert!(solved > 0);
    }
}
