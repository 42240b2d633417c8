mod astar;

pub(crate) use astar::a_star_search;

use std::collections::HashMap;

use crate::common::{Path, State};

type Trace = HashMap<State, State>;

fn construct_path(trace: &Trace, mut current: State) -> Path {
    let mut path = vec![current];
    while let Some(&previous) = trace.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}
