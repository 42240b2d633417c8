use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::warn;

use crate::common::Location;
use crate::error::InstanceError;

#[derive(Debug, Clone)]
pub struct Map {
    pub width: i32,
    pub height: i32,
    obstacles: HashSet<Location>,
}

impl Map {
    /// Builds a `width` x `height` grid. Obstacles outside the grid have no
    /// effect and are dropped.
    pub fn new(
        width: i32,
        height: i32,
        obstacles: impl IntoIterator<Item = Location>,
    ) -> Result<Self, InstanceError> {
        if width <= 0 || height <= 0 {
            return Err(InstanceError::InvalidDimensions { width, height });
        }

        let mut map = Map {
            width,
            height,
            obstacles: HashSet::new(),
        };
        for obstacle in obstacles {
            if map.in_bounds(obstacle) {
                map.obstacles.insert(obstacle);
            } else {
                warn!("ignore obstacle {obstacle} outside the {width}x{height} grid");
            }
        }
        Ok(map)
    }

    pub fn in_bounds(&self, location: Location) -> bool {
        location.x >= 0 && location.y >= 0 && location.x < self.width && location.y < self.height
    }

    pub fn is_obstacle(&self, location: Location) -> bool {
        self.obstacles.contains(&location)
    }

    pub fn is_passable(&self, location: Location) -> bool {
        self.in_bounds(location) && !self.is_obstacle(location)
    }

    pub fn passable_cells(&self) -> usize {
        (self.width as usize) * (self.height as usize) - self.obstacles.len()
    }

    /// Passable cells one step away, waiting excluded.
    pub fn get_neighbors(&self, location: Location) -> Vec<Location> {
        let directions = [(0, 1), (0, -1), (-1, 0), (1, 0)]; // Up, down, left, right
        directions
            .iter()
            .map(|&(dx, dy)| Location::new(location.x + dx, location.y + dy))
            .filter(|&neighbor| self.is_passable(neighbor))
            .collect()
    }

    /// Step distance from every passable cell that can reach `goal`, ignoring
    /// time. Cells missing from the table cannot reach the goal at all.
    pub fn distance_map(&self, goal: Location) -> HashMap<Location, usize> {
        let mut distance = HashMap::new();
        if !self.is_passable(goal) {
            return distance;
        }
        let mut heap = BinaryHeap::new();

        distance.insert(goal, 0);
        heap.push((Reverse(0), goal));

        while let Some((Reverse(cost), location)) = heap.pop() {
            if cost > distance[&location] {
                continue;
            }

            for neighbor in self.get_neighbors(location) {
                let next_cost = cost + 1;
                if next_cost < *distance.get(&neighbor).unwrap_or(&usize::MAX) {
                    heap.push((Reverse(next_cost), neighbor));
                    distance.insert(neighbor, next_cost);
                }
            }
        }

        distance
    }
}
