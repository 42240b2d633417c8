use std::fmt;

use thiserror::Error;

use crate::common::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    Goal,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::Goal => write!(f, "goal"),
        }
    }
}

/// Problems with an instance that are caught before any search runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("{endpoint} {location} of agent {agent} is outside the grid")]
    OutOfBounds {
        agent: String,
        endpoint: Endpoint,
        location: Location,
    },
    #[error("{endpoint} {location} of agent {agent} is on an obstacle")]
    OnObstacle {
        agent: String,
        endpoint: Endpoint,
        location: Location,
    },
    #[error("agent name {0} is used more than once")]
    DuplicateName(String),
    #[error("agents {agent_1} and {agent_2} share the {endpoint} {location}")]
    SharedEndpoint {
        agent_1: String,
        agent_2: String,
        endpoint: Endpoint,
        location: Location,
    },
}
