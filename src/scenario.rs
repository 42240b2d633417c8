use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Write};
use tracing::info;

use crate::common::{Agent, Location, Solution};
use crate::env::Environment;
use crate::error::InstanceError;
use crate::map::Map;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapYaml {
    pub dimensions: [i32; 2],
    #[serde(default)]
    pub obstacles: Vec<[i32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentYaml {
    pub name: String,
    pub start: [i32; 2],
    pub goal: [i32; 2],
}

/// A problem instance as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub map: MapYaml,
    pub agents: Vec<AgentYaml>,
}

impl Scenario {
    pub fn load_from_file(path: &str) -> Result<Scenario> {
        let file = File::open(path).with_context(|| format!("cannot open scenario {path}"))?;
        let reader = BufReader::new(file);
        let scenario: Scenario = serde_yaml::from_reader(reader)
            .with_context(|| format!("malformed scenario {path}"))?;
        Ok(scenario)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Scenario> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Checks the instance and turns it into an environment for the solver.
    pub fn into_environment(self) -> Result<Environment, InstanceError> {
        let [width, height] = self.map.dimensions;
        let obstacles = self
            .map
            .obstacles
            .iter()
            .map(|&[x, y]| Location::new(x, y));
        let map = Map::new(width, height, obstacles)?;

        let agents = self
            .agents
            .into_iter()
            .map(|agent| {
                Agent::new(
                    agent.name,
                    Location::new(agent.start[0], agent.start[1]),
                    Location::new(agent.goal[0], agent.goal[1]),
                )
            })
            .collect();

        Environment::new(map, agents)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub t: usize,
    pub x: i32,
    pub y: i32,
}

/// Per-agent time series handed to whatever renders or replays the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    #[serde(rename = "path planning")]
    pub path_planning: BTreeMap<String, Vec<ScheduleEntry>>,
    pub cost: usize,
}

impl Schedule {
    pub fn from_solution(solution: &Solution) -> Self {
        let path_planning = solution
            .paths
            .iter()
            .map(|(agent, path)| {
                let entries = path
                    .iter()
                    .map(|state| ScheduleEntry {
                        t: state.time,
                        x: state.location.x,
                        y: state.location.y,
                    })
                    .collect();
                (agent.clone(), entries)
            })
            .collect();

        Schedule {
            path_planning,
            cost: solution.cost,
        }
    }

    /// Writes JSON when `path` ends in `.json`, YAML otherwise.
    pub fn write_to_file(&self, path: &str) -> Result<()> {
        let file = File::create(path).with_context(|| format!("cannot create {path}"))?;
        let mut writer = io::BufWriter::new(file);
        if path.ends_with(".json") {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            writer.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        }
        writer.flush()?;

        info!("Write schedule for {} agents to {path}", self.path_planning.len());
        Ok(())
    }
}
