use super::construct_path;
use crate::common::{Agent, Constraints, LowLevelOpenNode, Path};
use crate::env::Environment;
use crate::stat::Stats;

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// Time-expanded A* for a single agent under its own constraints.
///
/// States are `(time, location)` pairs and every transition, waiting
/// included, costs one step. The goal test ignores time: the first popped
/// state on the goal cell ends the search.
///
/// Past the latest constraint the problem no longer depends on time, so any
/// shortest path reaches the goal within one step per passable cell after
/// it. States beyond that horizon are not expanded, which makes the search
/// fail instead of waiting forever when constraints cut the agent off.
#[instrument(skip_all, name = "a_star", fields(agent = %agent.name, start = %agent.start, goal = %agent.goal), level = "debug")]
pub(crate) fn a_star_search(
    env: &Environment,
    agent: &Agent,
    constraints: &Constraints,
    stats: &mut Stats,
) -> Option<Path> {
    debug!("constraints: {constraints:?}");

    if !env.is_reachable(agent) {
        debug!("goal is not reachable on the static grid");
        return None;
    }
    let horizon = constraints.latest_time_step().unwrap_or(0) + env.map.passable_cells();

    let mut open_list = BTreeSet::new();
    let mut closed_list = HashSet::new();
    let mut trace = HashMap::new();
    let mut g_cost_map = HashMap::new();

    let start = agent.start_state();
    open_list.insert(LowLevelOpenNode {
        state: start,
        f_open_cost: env.admissible_heuristic(&start, agent),
        g_cost: 0,
    });
    g_cost_map.insert(start, 0);

    while let Some(current) = open_list.pop_first() {
        trace!("expand node: {current:?}");

        // Update stats.
        stats.low_level_expand_nodes += 1;

        if env.is_at_goal(&current.state, agent) {
            return Some(construct_path(&trace, current.state));
        }

        closed_list.insert(current.state);
        if current.state.time >= horizon {
            continue;
        }

        // Assuming uniform cost.
        let tentative_g_cost = current.g_cost + 1;

        for neighbor in env.get_neighbors(&current.state, constraints) {
            // If node (position at next time) has closed, ignore.
            if closed_list.contains(&neighbor) {
                continue;
            }

            let old_g_cost = g_cost_map.get(&neighbor).copied();
            if old_g_cost.is_some_and(|old_g_cost| tentative_g_cost >= old_g_cost) {
                continue;
            }

            let h_open_cost = env.admissible_heuristic(&neighbor, agent);

            // Update old node in open list if it is already in the open list.
            if let Some(old_g_cost) = old_g_cost {
                open_list.remove(&LowLevelOpenNode {
                    state: neighbor,
                    f_open_cost: old_g_cost + h_open_cost,
                    g_cost: old_g_cost,
                });
            }

            trace.insert(neighbor, current.state);
            g_cost_map.insert(neighbor, tentative_g_cost);
            open_list.insert(LowLevelOpenNode {
                state: neighbor,
                f_open_cost: tentative_g_cost + h_open_cost,
                g_cost: tentative_g_cost,
            });
        }
        trace!("open list {open_list:?}");
    }

    debug!("cannot find solution");
    None
}
