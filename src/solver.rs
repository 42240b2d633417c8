mod cbs;

pub use cbs::CBS;

use crate::common::Solution;
use crate::config::Config;

pub trait Solver {
    fn solve(&mut self, config: &Config) -> Option<Solution>;
}
