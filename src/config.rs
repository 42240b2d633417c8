use anyhow::{anyhow, Context};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default)]
#[command(
    name = "cbs-mapf",
    about = "Multi-agent path finding on grids with Conflict-Based Search.",
    version = "0.1"
)]
pub struct Cli {
    #[arg(long, help = "Path to the YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the YAML instance file (map and agents)")]
    pub input_path: Option<String>,

    #[arg(long, help = "Path to the output schedule (.yaml or .json)")]
    pub output_path: Option<String>,

    #[arg(long, help = "Give up after expanding this many high level nodes")]
    pub max_high_level_expansions: Option<usize>,

    #[arg(long, help = "Log filter, e.g. info or cbs_mapf=debug")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub input_path: String,
    pub output_path: String,
    /// Unset means the high level search runs until it succeeds or its open
    /// list is exhausted.
    pub max_high_level_expansions: Option<usize>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_path: "input.yaml".to_string(),
            output_path: "output.yaml".to_string(),
            max_high_level_expansions: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).context("malformed config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(input_path) = &cli.input_path {
            self.input_path = input_path.clone();
        }
        if let Some(output_path) = &cli.output_path {
            self.output_path = output_path.clone();
        }
        if cli.max_high_level_expansions.is_some() {
            self.max_high_level_expansions = cli.max_high_level_expansions;
        }
        if let Some(log_level) = &cli.log_level {
            self.log_level = log_level.clone();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_high_level_expansions == Some(0) {
            return Err(anyhow!(
                "max high level expansions must be greater than 0, got 0"
            ));
        }

        if self.input_path.is_empty() {
            return Err(anyhow!("input path must not be empty"));
        }

        if self.output_path.is_empty() {
            return Err(anyhow!("output path must not be empty"));
        }

        EnvFilter::try_new(&self.log_level)
            .with_context(|| format!("invalid log level: {}", self.log_level))?;
        Ok(())
    }
}
