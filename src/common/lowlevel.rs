use super::State;

use std::cmp::Ordering;

#[derive(Clone, Eq, Debug, PartialEq, Hash)]
pub(crate) struct LowLevelOpenNode {
    pub(crate) state: State,
    pub(crate) f_open_cost: usize,
    pub(crate) g_cost: usize,
}

impl Ord for LowLevelOpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_open_cost
            .cmp(&other.f_open_cost)
            // Higher g cost has higher priority
            .then_with(|| other.g_cost.cmp(&self.g_cost))
            // Only a fixed tie-break, any minimum would do.
            .then_with(|| self.state.cmp(&other.state))
    }
}

impl PartialOrd for LowLevelOpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
